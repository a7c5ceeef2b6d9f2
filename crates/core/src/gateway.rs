//! Telephony Gateway Contract
//!
//! The gateway places outbound calls, converts speech to text and text to
//! speech, and drives the webhook conversation. Only its placement and
//! notification surfaces are modeled here; the api crate provides the Twilio
//! implementation.

use async_trait::async_trait;

/// The gateway's handle for a placed call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallHandle {
    pub sid: String,
}

/// Everything the gateway needs to place an outbound interview call.
#[derive(Debug, Clone)]
pub struct PlaceCallRequest {
    /// Destination number, normalized.
    pub to: String,
    /// The number the call is placed from.
    pub from: String,
    /// Where the gateway posts each conversation callback, seeded at step 0.
    pub callback_url: String,
    /// Where the gateway posts call-lifecycle events.
    pub status_callback_url: String,
    /// Which lifecycle events to report (e.g. "completed", "failed").
    pub status_events: Vec<String>,
}

/// Placement failures, distinct from validation errors at the API boundary.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("telephony gateway unreachable: {0}")]
    Transport(String),
    #[error("telephony gateway rejected the request: {0}")]
    Rejected(String),
}

/// Places outbound calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelephonyGateway: Send + Sync {
    async fn place_call(&self, request: PlaceCallRequest) -> Result<CallHandle, GatewayError>;
}

/// Delivers a human-readable outcome message to the applicant, out of band.
/// Best-effort: finalization never fails because a notification did.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, phone_number: &str, message: &str) -> anyhow::Result<()>;
}
