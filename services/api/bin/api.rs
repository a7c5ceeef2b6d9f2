//! Main Entrypoint for the Loanline API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Loading the decision rubric prompts and constructing shared services.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use loanline_api::{
    config::Config, router::create_router, state::AppState, store::JsonlResultStore,
    twilio::TwilioClient,
};
use loanline_core::{
    catalog::QuestionCatalog,
    decision::{DecisionService, LlmDecisionService},
    finalize::Finalizer,
    gateway::{Notifier, TelephonyGateway},
    session::{SessionStore, SystemClock},
};
use std::{collections::HashMap, fs, net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompts from a directory.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in std::fs::read_dir(prompts_path)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Load Prompts ---
    let prompts = load_prompts(&config.prompts_path)?;
    for key in ["loan_rubric", "credit_card_rubric"] {
        if !prompts.contains_key(key) {
            anyhow::bail!("{}.md not found in prompts directory", key);
        }
    }

    // --- 4. Initialize Shared Services ---
    let clock = Arc::new(SystemClock);
    let catalog = Arc::new(QuestionCatalog::new(&config.cc_disabled_questions));
    let sessions = Arc::new(SessionStore::new(
        config.session_cooldown_secs,
        clock.clone(),
    ));

    let twilio = Arc::new(TwilioClient::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_phone_number.clone(),
    ));
    let gateway: Arc<dyn TelephonyGateway> = twilio.clone();
    let notifier: Option<Arc<dyn Notifier>> = if config.sms_notifications {
        info!("SMS outcome notifications enabled.");
        Some(twilio.clone())
    } else {
        None
    };

    let openai_config = OpenAIConfig::new()
        .with_api_key(&config.openai_api_key)
        .with_api_base("https://api.openai.com/v1/");
    let decision: Arc<dyn DecisionService> = Arc::new(LlmDecisionService::new(
        openai_config,
        config.chat_model.clone(),
        prompts,
    ));

    let results = Arc::new(JsonlResultStore::new(
        config.results_path.clone(),
        config.incomplete_path.clone(),
    ));

    let finalizer = Arc::new(Finalizer::new(
        decision,
        results,
        notifier,
        catalog.clone(),
        config.min_answered_questions,
        config.incomplete_policy,
        clock,
    ));

    let app_state = Arc::new(AppState {
        sessions,
        finalizer,
        gateway,
        catalog,
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        model = %config.chat_model,
        base_url = %config.base_url,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
