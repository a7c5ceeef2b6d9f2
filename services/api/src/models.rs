//! API and Webhook Models
//!
//! Payloads for the REST surface (with `utoipa` schemas for the generated
//! OpenAPI documentation) plus the parameter shapes the telephony gateway
//! round-trips through callback URLs and form bodies.

use loanline_core::catalog::ApplicationType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

fn default_customer_name() -> String {
    "Customer".to_string()
}

/// Request body for `POST /call-loan` and `POST /call-cc`.
#[derive(Deserialize, ToSchema)]
pub struct InitiateCallPayload {
    #[schema(example = "+919999999999")]
    pub phone_number: String,
    #[serde(default = "default_customer_name")]
    #[schema(example = "Asha")]
    pub name: String,
}

/// Successful call placement.
#[derive(Serialize, ToSchema)]
pub struct CallInitiated {
    pub message: String,
    pub call_sid: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
    /// Present on conflicts: the handle of the call already in progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_sid: Option<String>,
}

/// Index/health document, also enumerating the available endpoints.
#[derive(Serialize, ToSchema)]
pub struct ServiceInfo {
    pub message: String,
    pub endpoints: BTreeMap<String, String>,
    pub status: String,
}

/// Identity parameters carried in every callback URL we hand the gateway.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub application_type: ApplicationType,
    pub name: String,
    pub phone_number: String,
    #[serde(default)]
    pub step: u32,
}

/// Form body the gateway posts to `/handle-call`. Fields beyond the
/// transcript ride along on some callbacks and are logged only.
#[derive(Debug, Default, Deserialize)]
pub struct SpeechCallback {
    #[serde(rename = "SpeechResult")]
    pub speech_result: Option<String>,
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
}

/// Form body the gateway posts to `/call-status` on lifecycle events.
#[derive(Debug, Default, Deserialize)]
pub struct StatusCallback {
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "CallDuration")]
    pub call_duration: Option<String>,
}
