//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application: the
//! REST surface for initiating calls, the telephony webhook endpoints, and
//! the OpenAPI documentation.

use crate::{
    handlers,
    models::{CallInitiated, ErrorResponse, InitiateCallPayload, ServiceInfo},
    state::AppState,
    webhook,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::index,
        handlers::initiate_loan_call,
        handlers::initiate_cc_call,
    ),
    components(
        schemas(InitiateCallPayload, CallInitiated, ErrorResponse, ServiceInfo)
    ),
    tags(
        (name = "Loanline API", description = "Automated phone interviews for loan and credit card applications")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/", get(handlers::index))
        .route("/call-loan", post(handlers::initiate_loan_call))
        .route("/call-cc", post(handlers::initiate_cc_call))
        .route("/handle-call", post(webhook::handle_call))
        .route("/call-status", post(webhook::call_status))
        .with_state(app_state);

    // Merge the stateful routes with the stateless Swagger UI routes.
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
