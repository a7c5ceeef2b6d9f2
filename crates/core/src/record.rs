//! Result Persistence Contract
//!
//! One record is appended per finalized session. The storage layout is not
//! part of the contract; any durable append-only store satisfies it. The api
//! crate ships a JSON-lines implementation.

use crate::catalog::ApplicationType;
use crate::decision::Verdict;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The outcome of one evaluated interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub name: String,
    pub phone_number: String,
    pub application_type: ApplicationType,
    pub decision: Verdict,
    pub timestamp: DateTime<Utc>,
}

/// A session that ended before enough questions were answered to evaluate.
/// Only written when the incomplete policy is set to archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncompleteRecord {
    pub name: String,
    pub phone_number: String,
    pub application_type: ApplicationType,
    pub answered: usize,
    /// Canonical question key to the caller's recorded utterance.
    pub responses: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

/// Durable, append-only store for interview outcomes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn append(&self, record: &ResultRecord) -> Result<()>;
    async fn archive_incomplete(&self, record: &IncompleteRecord) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_record_round_trips_through_json() {
        let record = ResultRecord {
            name: "Asha".to_string(),
            phone_number: "+919999999999".to_string(),
            application_type: ApplicationType::Loan,
            decision: Verdict::Approved,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let parsed: ResultRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
        assert!(json.contains("\"APPROVED\""));
        assert!(json.contains("\"loan\""));
    }
}
