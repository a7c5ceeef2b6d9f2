//! Interview Question Catalog
//!
//! Supplies the ordered list of prompts for each application type. The
//! catalogs are fixed at process start; the credit-card list may have a
//! subset disabled by configuration, so callers must treat the active list
//! length as dynamic rather than assuming ten questions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of application an interview collects answers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationType {
    Loan,
    CreditCard,
}

impl ApplicationType {
    /// Wire form, as carried in callback URL query parameters.
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationType::Loan => "loan",
            ApplicationType::CreditCard => "credit_card",
        }
    }

    /// How the application type is referred to in spoken prompts.
    pub fn spoken_name(self) -> &'static str {
        match self {
            ApplicationType::Loan => "loan",
            ApplicationType::CreditCard => "credit card",
        }
    }

    /// Key of the decision rubric prompt for this application type.
    pub fn rubric_key(self) -> &'static str {
        match self {
            ApplicationType::Loan => "loan_rubric",
            ApplicationType::CreditCard => "credit_card_rubric",
        }
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical form of a question prompt, used as the field name when the
/// aggregated answers are handed to the decision service: lower-cased,
/// trailing question mark stripped, whitespace runs replaced with `_`.
pub fn canonical_key(prompt: &str) -> String {
    prompt
        .trim()
        .trim_end_matches('?')
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

fn loan_questions() -> Vec<String> {
    [
        "What is your current age?",
        "What is your monthly income in Indian Rupees?",
        "Are you a salaried employee, self-employed, or a business owner?",
        "In which city and state do you currently reside?",
        "What is your current occupation and industry?",
        "How much loan amount are you seeking in Indian Rupees?",
        "Do you have a CIBIL credit score?",
        "Are you a first-time loan applicant?",
        "Do you have any existing EMIs or loan commitments?",
        "What is the primary purpose of this loan?",
    ]
    .map(String::from)
    .to_vec()
}

fn credit_card_questions() -> Vec<String> {
    [
        "What is your current age?",
        "What is your annual income in Indian Rupees?",
        "Are you employed in private sector, government, or self-employed?",
        "In which city do you currently work?",
        "Do you have any existing credit cards?",
        "What is your CIBIL credit score?",
        "Have you ever defaulted on any credit or loan payment?",
        "What is your typical monthly household expenditure?",
        "Do you have any existing loan EMIs?",
        "Are you a first-time credit card applicant?",
    ]
    .map(String::from)
    .to_vec()
}

/// The fixed, per-process set of interview scripts.
#[derive(Debug, Clone)]
pub struct QuestionCatalog {
    loan: Vec<String>,
    credit_card: Vec<String>,
}

impl QuestionCatalog {
    /// Builds the catalog. `disabled_credit_card` lists positions in the full
    /// credit-card script to leave out; the remaining prompts form the active
    /// list that the call flow and finalizer operate on.
    pub fn new(disabled_credit_card: &[usize]) -> Self {
        let credit_card = credit_card_questions()
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !disabled_credit_card.contains(i))
            .map(|(_, q)| q)
            .collect();
        Self {
            loan: loan_questions(),
            credit_card,
        }
    }

    /// The active, ordered prompt list for an application type.
    pub fn questions_for(&self, application_type: ApplicationType) -> &[String] {
        match application_type {
            ApplicationType::Loan => &self.loan,
            ApplicationType::CreditCard => &self.credit_card,
        }
    }
}

impl Default for QuestionCatalog {
    fn default() -> Self {
        Self::new(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_catalogs_have_ten_questions() {
        let catalog = QuestionCatalog::default();
        assert_eq!(catalog.questions_for(ApplicationType::Loan).len(), 10);
        assert_eq!(catalog.questions_for(ApplicationType::CreditCard).len(), 10);
    }

    #[test]
    fn disabling_credit_card_questions_shrinks_active_list() {
        let catalog = QuestionCatalog::new(&[0, 4, 9]);
        let active = catalog.questions_for(ApplicationType::CreditCard);
        assert_eq!(active.len(), 7);
        // The first active prompt is the first one that was not disabled.
        assert_eq!(active[0], "What is your annual income in Indian Rupees?");
        // The loan script is unaffected.
        assert_eq!(catalog.questions_for(ApplicationType::Loan).len(), 10);
    }

    #[test]
    fn canonical_key_strips_and_joins() {
        assert_eq!(
            canonical_key("What is your current age?"),
            "what_is_your_current_age"
        );
        assert_eq!(
            canonical_key("  Do you have a CIBIL credit score?  "),
            "do_you_have_a_cibil_credit_score"
        );
        assert_eq!(canonical_key("No  question   mark"), "no_question_mark");
    }

    #[test]
    fn application_type_wire_round_trip() {
        let loan: ApplicationType = serde_json::from_str("\"loan\"").unwrap();
        let cc: ApplicationType = serde_json::from_str("\"credit_card\"").unwrap();
        assert_eq!(loan, ApplicationType::Loan);
        assert_eq!(cc, ApplicationType::CreditCard);
        assert_eq!(loan.as_str(), "loan");
        assert_eq!(cc.as_str(), "credit_card");
    }
}
