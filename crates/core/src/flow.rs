//! Call Flow Controller
//!
//! The scripted dialogue is a state machine re-entered once per gateway
//! callback. The callback carries the step number round-tripped through the
//! callback URL plus the transcript of whatever the caller last said; this
//! module reconstructs the conversation position from those two values and
//! the stored session, mutates the session, and emits the next
//! [`VoiceDirective`].
//!
//! Step meaning (answer-at-arrival convention):
//! - step 0: opening consent question. No session mutation.
//! - step 1: the utterance answers the consent question. Affirmative asks
//!   question 0 and listens with step 2; negative ends the call.
//! - step N >= 2: the utterance is the answer to question N - 2 and the
//!   question asked next has index N - 1. When N - 1 runs past the end of
//!   the active list the interview is complete and finalization runs inside
//!   the same callback.

use crate::catalog::ApplicationType;
use crate::finalize::FinalizeOutcome;
use crate::session::InterviewSession;
use crate::{VoiceAction, VoiceDirective};

/// A consent reply counts as affirmative iff it contains one of these,
/// case-insensitively. Anything else, including silence, is a decline.
const CONSENT_KEYWORDS: &[&str] = &["yes", "yeah", "okay", "ok", "sure", "go ahead", "alright"];

pub fn is_affirmative(utterance: &str) -> bool {
    let lowered = utterance.to_lowercase();
    CONSENT_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// What the controller decided for this callback.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
    /// Keep the conversation going: speak, listen, call back.
    Continue(VoiceDirective),
    /// The caller declined to proceed. The directive hangs up; the caller of
    /// `advance` is responsible for discarding the session.
    Declined(VoiceDirective),
    /// The terminal question boundary was reached. Finalization must run
    /// synchronously within the same callback, and its outcome becomes the
    /// closing directive.
    Finalize,
}

/// Advances the dialogue by one callback.
///
/// `utterance` is the possibly-empty transcript of the caller's last speech.
/// A repeated step with a different utterance overwrites the recorded
/// answer; an empty transcript records nothing and simply moves on.
pub fn advance(
    session: &mut InterviewSession,
    application_type: ApplicationType,
    questions: &[String],
    step: u32,
    utterance: &str,
) -> FlowOutcome {
    match step {
        0 => {
            let greeting = format!(
                "Hello {}! This is Loanline calling about your {} application. \
                 I would like to ask you a few short questions, which will only \
                 take a few minutes. Shall we begin?",
                session.customer_name,
                application_type.spoken_name(),
            );
            FlowOutcome::Continue(VoiceDirective::new(vec![VoiceAction::Gather {
                prompt: greeting,
                next_step: 1,
            }]))
        }
        1 => {
            if !is_affirmative(utterance) {
                tracing::info!(name = %session.customer_name, "Caller declined the interview");
                return FlowOutcome::Declined(VoiceDirective::say_then_hangup(
                    "No problem at all. Thank you for your time, and have a great day. Goodbye!",
                ));
            }
            let Some(first_question) = questions.first() else {
                // Every question disabled by configuration; nothing to ask.
                return FlowOutcome::Finalize;
            };
            FlowOutcome::Continue(VoiceDirective::new(vec![
                VoiceAction::Say("Great, thank you! Let's get started.".to_string()),
                VoiceAction::Gather {
                    prompt: first_question.clone(),
                    next_step: 2,
                },
            ]))
        }
        n => {
            let answered_index = (n - 2) as usize;
            if !utterance.trim().is_empty() && answered_index < questions.len() {
                session
                    .responses
                    .insert(answered_index, utterance.to_string());
                tracing::debug!(
                    question_index = answered_index,
                    "Recorded answer"
                );
            }

            let next_index = (n - 1) as usize;
            match questions.get(next_index) {
                Some(question) => FlowOutcome::Continue(VoiceDirective::new(vec![
                    VoiceAction::Gather {
                        prompt: question.clone(),
                        next_step: n + 1,
                    },
                ])),
                None => FlowOutcome::Finalize,
            }
        }
    }
}

/// The directive spoken after finalization ran at the end of the
/// conversation path.
pub fn closing_directive(outcome: &FinalizeOutcome) -> VoiceDirective {
    match outcome {
        FinalizeOutcome::Delivered(verdict) => VoiceDirective::new(vec![
            VoiceAction::Say(
                "That completes all my questions. Thank you for your patience.".to_string(),
            ),
            VoiceAction::Pause(1),
            VoiceAction::Say(verdict.spoken_line().to_string()),
            VoiceAction::Hangup,
        ]),
        FinalizeOutcome::Incomplete { .. } => VoiceDirective::say_then_hangup(
            "Thank you for your time. We did not collect enough answers to \
             evaluate your application on this call. Goodbye!",
        ),
        FinalizeOutcome::AlreadyDone | FinalizeOutcome::NoSession => {
            VoiceDirective::say_then_hangup("Thank you for your time. Goodbye!")
        }
    }
}

/// The generic apology used whenever something goes wrong mid-call. The
/// gateway must always receive a valid voice document, never an error.
pub fn apology_directive() -> VoiceDirective {
    VoiceDirective::say_then_hangup(
        "I am sorry, something went wrong on our end. We will reach out to you \
         again soon. Goodbye.",
    )
}
