//! Telephony Gateway Callbacks
//!
//! Two independent channels re-enter the system here: `/handle-call` carries
//! the conversation (one POST per caller utterance), `/call-status` carries
//! call-lifecycle events. Both may fire for the same call around its end;
//! the per-session slot lock serializes them so finalization runs at most
//! once.
//!
//! The contract with the gateway is "always answer with a valid voice
//! document": every internal failure inside `/handle-call` is converted into
//! the apology directive at the outermost boundary, never into an HTTP
//! error.

use anyhow::Result;
use axum::{
    extract::{Form, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use loanline_core::finalize::FinalizeOutcome;
use loanline_core::flow::{self, FlowOutcome};
use loanline_core::session::SessionKey;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    models::{CallbackQuery, SpeechCallback, StatusCallback},
    state::AppState,
    twiml::{self, CallbackContext},
};

/// Call statuses after which no more conversation callbacks will arrive.
const TERMINAL_STATUSES: &[&str] = &["completed", "failed", "busy", "no-answer", "canceled"];

fn is_terminal_status(status: &str) -> bool {
    TERMINAL_STATUSES.contains(&status.to_lowercase().as_str())
}

fn twiml_response(document: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml")],
        document,
    )
        .into_response()
}

/// Conversation callback: one POST per utterance (or silence timeout).
pub async fn handle_call(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
    Form(form): Form<SpeechCallback>,
) -> Response {
    let document = match run_handle_call(&state, &query, form).await {
        Ok(document) => document,
        Err(e) => {
            error!(error = ?e, "handle-call failed; responding with apology");
            apology_document(&state, &query)
        }
    };
    twiml_response(document)
}

/// The fallback document. Terminal, so rendering cannot fail: no gather
/// means no callback URL to construct.
fn apology_document(state: &Arc<AppState>, query: &CallbackQuery) -> String {
    let ctx = callback_context(state, query);
    twiml::render(&flow::apology_directive(), &ctx).unwrap_or_else(|_| {
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Hangup/></Response>".to_string()
    })
}

fn callback_context<'a>(state: &'a Arc<AppState>, query: &'a CallbackQuery) -> CallbackContext<'a> {
    CallbackContext {
        base_url: &state.config.base_url,
        application_type: query.application_type,
        customer_name: &query.name,
        phone_number: &query.phone_number,
    }
}

async fn run_handle_call(
    state: &Arc<AppState>,
    query: &CallbackQuery,
    form: SpeechCallback,
) -> Result<String> {
    let utterance = form.speech_result.unwrap_or_default();

    info!(
        application_type = %query.application_type,
        phone_number = %query.phone_number,
        step = query.step,
        call_sid = form.call_sid.as_deref().unwrap_or(""),
        has_speech = !utterance.trim().is_empty(),
        "Conversation callback"
    );

    let ctx = callback_context(state, query);
    let key = SessionKey::new(query.phone_number.clone(), query.application_type);

    let Some(slot) = state.sessions.slot(&key).await else {
        warn!(phone_number = %query.phone_number, "Callback for unknown session");
        return twiml::render(&flow::apology_directive(), &ctx);
    };

    let mut guard = slot.lock().await;
    let questions = state.catalog.questions_for(query.application_type);

    let outcome = match guard.as_mut() {
        Some(session) => flow::advance(
            session,
            query.application_type,
            questions,
            query.step,
            utterance.trim(),
        ),
        None => {
            // The status channel finalized this call between lookup and lock.
            return twiml::render(
                &flow::closing_directive(&FinalizeOutcome::NoSession),
                &ctx,
            );
        }
    };

    let directive = match outcome {
        FlowOutcome::Continue(directive) => directive,
        FlowOutcome::Declined(directive) => {
            *guard = None;
            state.sessions.remove(&key, &slot).await;
            directive
        }
        FlowOutcome::Finalize => {
            let final_outcome = state.finalizer.finalize(&key, &mut *guard).await;
            state.sessions.remove(&key, &slot).await;
            flow::closing_directive(&final_outcome)
        }
    };
    drop(guard);

    twiml::render(&directive, &ctx)
}

/// Lifecycle callback: finalizes sessions whose call ended before the
/// conversation path got there. Always 200; the gateway retries otherwise.
pub async fn call_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
    Form(form): Form<StatusCallback>,
) -> StatusCode {
    let call_status = form.call_status.unwrap_or_default();

    info!(
        application_type = %query.application_type,
        phone_number = %query.phone_number,
        call_status = %call_status,
        call_sid = form.call_sid.as_deref().unwrap_or(""),
        call_duration = form.call_duration.as_deref().unwrap_or(""),
        "Status callback"
    );

    if !is_terminal_status(&call_status) {
        return StatusCode::OK;
    }

    let key = SessionKey::new(query.phone_number.clone(), query.application_type);
    let Some(slot) = state.sessions.slot(&key).await else {
        return StatusCode::OK;
    };

    let mut guard = slot.lock().await;
    let outcome = state.finalizer.finalize(&key, &mut *guard).await;
    state.sessions.remove(&key, &slot).await;
    drop(guard);

    info!(
        phone_number = %query.phone_number,
        outcome = ?outcome,
        "Finalized from status callback"
    );
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_are_recognized() {
        for status in ["completed", "failed", "busy", "no-answer", "canceled"] {
            assert!(is_terminal_status(status), "{} should be terminal", status);
        }
        assert!(is_terminal_status("Completed"));
    }

    #[test]
    fn non_terminal_statuses_are_ignored() {
        for status in ["queued", "initiated", "ringing", "in-progress", ""] {
            assert!(
                !is_terminal_status(status),
                "{} should not be terminal",
                status
            );
        }
    }
}
