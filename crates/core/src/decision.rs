//! Application Decision Service
//!
//! The decision service receives the aggregated, canonicalized interview
//! answers and returns exactly one of three literal tokens. The external
//! contract is informal, so the boundary is modeled as a closed three-variant
//! type with an explicit mapping from the raw string; anything the mapping
//! does not recognize collapses to the conservative
//! `NEEDS_VERIFICATION` variant.

use crate::catalog::ApplicationType;
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Canonical question key to the caller's recorded utterance. Ordered so the
/// rendered prompt is deterministic.
pub type ApplicationData = BTreeMap<String, String>;

/// The decision service's three-valued output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "APPROVED")]
    Approved,
    #[serde(rename = "REJECTED")]
    Rejected,
    #[serde(rename = "NEEDS_VERIFICATION")]
    NeedsVerification,
}

impl Verdict {
    pub fn as_token(self) -> &'static str {
        match self {
            Verdict::Approved => "APPROVED",
            Verdict::Rejected => "REJECTED",
            Verdict::NeedsVerification => "NEEDS_VERIFICATION",
        }
    }

    /// Maps the raw external string to a variant. Tolerates casing,
    /// surrounding punctuation, and space-versus-underscore; any other
    /// output maps to [`Verdict::NeedsVerification`].
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw
            .trim()
            .trim_matches(|c: char| !c.is_ascii_alphanumeric());
        let normalized = trimmed
            .to_uppercase()
            .split(|c: char| c.is_whitespace() || c == '_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_");
        match normalized.as_str() {
            "APPROVED" => Verdict::Approved,
            "REJECTED" => Verdict::Rejected,
            "NEEDS_VERIFICATION" => Verdict::NeedsVerification,
            other => {
                tracing::debug!(raw = %other, "Unrecognized decision token; defaulting");
                Verdict::NeedsVerification
            }
        }
    }

    /// The line spoken to the caller when this verdict is delivered.
    pub fn spoken_line(self) -> &'static str {
        match self {
            Verdict::Approved => {
                "Good news! Based on your answers, your application has been approved for processing. Our team will contact you with the next steps."
            }
            Verdict::Rejected => {
                "Unfortunately, based on your answers, we are unable to approve your application at this time."
            }
            Verdict::NeedsVerification => {
                "Your application needs a manual verification step. Our team will contact you shortly."
            }
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Defines the contract for evaluating a completed interview.
///
/// A single best-effort attempt is expected; callers absorb any error into
/// the conservative verdict because the voice response must still be
/// produced within the gateway's response budget.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecisionService: Send + Sync {
    async fn evaluate(
        &self,
        application_type: ApplicationType,
        application: &ApplicationData,
    ) -> Result<Verdict>;
}

/// A [`DecisionService`] backed by an OpenAI-compatible chat-completions API.
///
/// One rubric prompt per application type is loaded from the prompts
/// directory at startup and sent as the system message.
pub struct LlmDecisionService {
    client: Client<OpenAIConfig>,
    model: String,
    prompts: HashMap<String, String>,
}

impl LlmDecisionService {
    pub fn new(config: OpenAIConfig, model: String, prompts: HashMap<String, String>) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            prompts,
        }
    }

    fn render_application(application: &ApplicationData) -> String {
        let mut lines = String::new();
        for (question, answer) in application {
            lines.push_str(question);
            lines.push_str(": ");
            lines.push_str(answer);
            lines.push('\n');
        }
        lines
    }
}

#[async_trait]
impl DecisionService for LlmDecisionService {
    async fn evaluate(
        &self,
        application_type: ApplicationType,
        application: &ApplicationData,
    ) -> Result<Verdict> {
        let rubric = self
            .prompts
            .get(application_type.rubric_key())
            .with_context(|| {
                format!("Missing rubric prompt: '{}'", application_type.rubric_key())
            })?;

        let user_message = format!(
            "Applicant details for a {} application:\n{}\nRespond with exactly one of: APPROVED, REJECTED, NEEDS_VERIFICATION.",
            application_type.spoken_name(),
            Self::render_application(application),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(rubric.clone())
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_message)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;
        let raw = response
            .choices
            .first()
            .context("No response choice from decision model")?
            .message
            .content
            .as_ref()
            .context("No content in decision model response")?;

        let verdict = Verdict::from_raw(raw);
        tracing::info!(%application_type, raw = %raw.trim(), %verdict, "Decision received");
        Ok(verdict)
    }
}

/// A [`DecisionService`] with a fixed answer, for development and
/// integration testing without external dependencies or API costs.
pub struct StaticDecisionService(pub Verdict);

#[async_trait]
impl DecisionService for StaticDecisionService {
    async fn evaluate(
        &self,
        _application_type: ApplicationType,
        _application: &ApplicationData,
    ) -> Result<Verdict> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_accepts_exact_tokens() {
        assert_eq!(Verdict::from_raw("APPROVED"), Verdict::Approved);
        assert_eq!(Verdict::from_raw("REJECTED"), Verdict::Rejected);
        assert_eq!(
            Verdict::from_raw("NEEDS_VERIFICATION"),
            Verdict::NeedsVerification
        );
    }

    #[test]
    fn from_raw_tolerates_casing_punctuation_and_spaces() {
        assert_eq!(Verdict::from_raw("  approved.  "), Verdict::Approved);
        assert_eq!(Verdict::from_raw("\"Rejected\""), Verdict::Rejected);
        assert_eq!(
            Verdict::from_raw("needs verification"),
            Verdict::NeedsVerification
        );
    }

    #[test]
    fn from_raw_defaults_unknown_output_to_needs_verification() {
        assert_eq!(
            Verdict::from_raw("The applicant looks fine to me"),
            Verdict::NeedsVerification
        );
        assert_eq!(Verdict::from_raw(""), Verdict::NeedsVerification);
    }

    #[test]
    fn verdict_serializes_to_literal_tokens() {
        assert_eq!(
            serde_json::to_string(&Verdict::Approved).unwrap(),
            "\"APPROVED\""
        );
        let round: Verdict = serde_json::from_str("\"NEEDS_VERIFICATION\"").unwrap();
        assert_eq!(round, Verdict::NeedsVerification);
    }

    #[test]
    fn render_application_is_deterministic() {
        let mut data = ApplicationData::new();
        data.insert("what_is_your_current_age".into(), "29".into());
        data.insert("do_you_have_a_cibil_credit_score".into(), "Yes, 750".into());
        let rendered = LlmDecisionService::render_application(&data);
        assert_eq!(
            rendered,
            "do_you_have_a_cibil_credit_score: Yes, 750\nwhat_is_your_current_age: 29\n"
        );
    }
}
