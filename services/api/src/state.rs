//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources: the session store, the finalizer with its
//! collaborators, the telephony gateway, and the question catalog.

use crate::config::Config;
use loanline_core::catalog::QuestionCatalog;
use loanline_core::finalize::Finalizer;
use loanline_core::gateway::TelephonyGateway;
use loanline_core::session::SessionStore;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub finalizer: Arc<Finalizer>,
    pub gateway: Arc<dyn TelephonyGateway>,
    pub catalog: Arc<QuestionCatalog>,
    pub config: Arc<Config>,
}
