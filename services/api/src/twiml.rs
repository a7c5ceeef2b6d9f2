//! TwiML Rendering
//!
//! Converts a core [`VoiceDirective`] into the voice-response markup the
//! telephony gateway consumes. Gather actions point back at `/handle-call`
//! with the four identity parameters plus the next step, so the otherwise
//! stateless protocol can reconstruct its position on every callback.

use anyhow::Result;
use loanline_core::catalog::ApplicationType;
use loanline_core::{VoiceAction, VoiceDirective};
use url::Url;

/// How long the gateway waits for speech before posting an empty result.
const SPEECH_TIMEOUT_SECS: u32 = 5;

/// Everything needed to rebuild callback URLs for one call.
#[derive(Debug, Clone)]
pub struct CallbackContext<'a> {
    pub base_url: &'a str,
    pub application_type: ApplicationType,
    pub customer_name: &'a str,
    pub phone_number: &'a str,
}

impl CallbackContext<'_> {
    fn url_for(&self, endpoint: &str, step: u32) -> Result<String> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, endpoint))?;
        url.query_pairs_mut()
            .append_pair("application_type", self.application_type.as_str())
            .append_pair("name", self.customer_name)
            .append_pair("phone_number", self.phone_number)
            .append_pair("step", &step.to_string());
        Ok(url.to_string())
    }

    /// The conversation callback, carrying `step` as the dialogue position.
    pub fn handle_call_url(&self, step: u32) -> Result<String> {
        self.url_for("handle-call", step)
    }

    /// The lifecycle-event callback.
    pub fn status_url(&self) -> Result<String> {
        self.url_for("call-status", 0)
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Renders `directive` as a complete TwiML document.
///
/// Only `Gather` actions need the context; terminal directives render the
/// same regardless of what it contains.
pub fn render(directive: &VoiceDirective, ctx: &CallbackContext<'_>) -> Result<String> {
    let mut doc = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");
    for action in &directive.actions {
        match action {
            VoiceAction::Say(text) => {
                doc.push_str("<Say>");
                doc.push_str(&escape(text));
                doc.push_str("</Say>");
            }
            VoiceAction::Pause(seconds) => {
                doc.push_str(&format!("<Pause length=\"{}\"/>", seconds));
            }
            VoiceAction::Gather { prompt, next_step } => {
                let action_url = ctx.handle_call_url(*next_step)?;
                doc.push_str(&format!(
                    "<Gather input=\"speech\" method=\"POST\" timeout=\"{}\" action=\"{}\">",
                    SPEECH_TIMEOUT_SECS,
                    escape(&action_url),
                ));
                doc.push_str("<Say>");
                doc.push_str(&escape(prompt));
                doc.push_str("</Say></Gather>");
            }
            VoiceAction::Hangup => doc.push_str("<Hangup/>"),
        }
    }
    doc.push_str("</Response>");
    Ok(doc)
}
