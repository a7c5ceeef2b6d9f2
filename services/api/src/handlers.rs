//! Axum Handlers for the REST API
//!
//! Call-initiation endpoints and the index/health document. These are the
//! only routes human operators hit directly; the telephony gateway talks to
//! the webhook module instead. Uses `utoipa` doc comments to generate
//! OpenAPI documentation.

use axum::{
    extract::{Json, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use loanline_core::catalog::ApplicationType;
use loanline_core::gateway::{GatewayError, PlaceCallRequest};
use loanline_core::session::{BeginError, SessionKey};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    models::{CallInitiated, ErrorResponse, InitiateCallPayload, ServiceInfo},
    phone::normalize_phone,
    state::AppState,
    twiml::CallbackContext,
};

/// Lifecycle events the gateway reports to `/call-status`.
const STATUS_EVENTS: &[&str] = &["completed", "busy", "failed", "no-answer", "canceled"];

pub enum ApiError {
    BadRequest(String),
    Conflict { call_sid: Option<String> },
    BadGateway(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    message,
                    call_sid: None,
                }),
            )
                .into_response(),
            ApiError::Conflict { call_sid } => (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    message: "A call for this application is already in progress".to_string(),
                    call_sid,
                }),
            )
                .into_response(),
            ApiError::BadGateway(message) => (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    message: format!("Call placement failed: {}", message),
                    call_sid: None,
                }),
            )
                .into_response(),
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        message,
                        call_sid: None,
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Start an automated loan interview call.
#[utoipa::path(
    post,
    path = "/call-loan",
    request_body = InitiateCallPayload,
    responses(
        (status = 201, description = "Call placed", body = CallInitiated),
        (status = 400, description = "Invalid phone number or payload", body = ErrorResponse),
        (status = 409, description = "A call for this number is already in progress", body = ErrorResponse),
        (status = 502, description = "Telephony gateway failure", body = ErrorResponse)
    )
)]
pub async fn initiate_loan_call(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InitiateCallPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    initiate_call(state, ApplicationType::Loan, payload).await
}

/// Start an automated credit-card interview call.
#[utoipa::path(
    post,
    path = "/call-cc",
    request_body = InitiateCallPayload,
    responses(
        (status = 201, description = "Call placed", body = CallInitiated),
        (status = 400, description = "Invalid phone number or payload", body = ErrorResponse),
        (status = 409, description = "A call for this number is already in progress", body = ErrorResponse),
        (status = 502, description = "Telephony gateway failure", body = ErrorResponse)
    )
)]
pub async fn initiate_cc_call(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InitiateCallPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    initiate_call(state, ApplicationType::CreditCard, payload).await
}

/// Places the outbound call and seeds the session for its first callback.
async fn initiate_call(
    state: Arc<AppState>,
    application_type: ApplicationType,
    payload: InitiateCallPayload,
) -> Result<(StatusCode, Json<CallInitiated>), ApiError> {
    let phone_number =
        normalize_phone(&payload.phone_number).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let trimmed = payload.name.trim();
    let customer_name = if trimmed.is_empty() { "Customer" } else { trimmed };

    let key = SessionKey::new(phone_number.clone(), application_type);
    let slot = state
        .sessions
        .begin(&key, customer_name)
        .await
        .map_err(|BeginError::ActiveCall { call_sid }| ApiError::Conflict { call_sid })?;

    let ctx = CallbackContext {
        base_url: &state.config.base_url,
        application_type,
        customer_name,
        phone_number: &phone_number,
    };
    let request = PlaceCallRequest {
        to: phone_number.clone(),
        from: state.config.twilio_phone_number.clone(),
        callback_url: ctx.handle_call_url(0)?,
        status_callback_url: ctx.status_url()?,
        status_events: STATUS_EVENTS.iter().map(|s| s.to_string()).collect(),
    };

    match state.gateway.place_call(request).await {
        Ok(handle) => {
            if let Some(session) = slot.lock().await.as_mut() {
                session.call_sid = handle.sid.clone();
            }
            info!(
                %application_type,
                phone_number = %phone_number,
                call_sid = %handle.sid,
                "Interview call initiated"
            );
            Ok((
                StatusCode::CREATED,
                Json(CallInitiated {
                    message: "Call initiated".to_string(),
                    call_sid: handle.sid,
                }),
            ))
        }
        Err(e) => {
            // Roll the freshly created session back so a retry is not
            // rejected as a conflict.
            state.sessions.remove(&key, &slot).await;
            warn!(%application_type, phone_number = %phone_number, error = %e, "Call placement failed");
            match e {
                GatewayError::Transport(m) | GatewayError::Rejected(m) => {
                    Err(ApiError::BadGateway(m))
                }
            }
        }
    }
}

/// Service index and liveness document.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service is running", body = ServiceInfo)
    )
)]
pub async fn index() -> Json<ServiceInfo> {
    let mut endpoints = BTreeMap::new();
    endpoints.insert(
        "POST /call-loan".to_string(),
        "Initiate a phone interview for a loan application".to_string(),
    );
    endpoints.insert(
        "POST /call-cc".to_string(),
        "Initiate a phone interview for a credit card application".to_string(),
    );
    endpoints.insert(
        "POST /handle-call".to_string(),
        "Telephony gateway conversation callback".to_string(),
    );
    endpoints.insert(
        "POST /call-status".to_string(),
        "Telephony gateway lifecycle callback".to_string(),
    );
    Json(ServiceInfo {
        message: "Welcome to Loanline, your loan and credit card interview assistant".to_string(),
        endpoints,
        status: "running".to_string(),
    })
}
