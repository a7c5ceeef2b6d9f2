//! Finalization Dispatcher
//!
//! Finalization is triggered from two independent call sites: the
//! conversation path reaching the last question, and the call-status
//! callback reporting that the call ended early. Both paths must agree on
//! at-most-once semantics: callers hold the session's slot lock for the
//! whole `finalize` call, so the first trigger evaluates, persists, and
//! clears the slot, and the second observes an empty slot and no-ops.

use crate::catalog::{QuestionCatalog, canonical_key};
use crate::decision::{ApplicationData, DecisionService, Verdict};
use crate::gateway::Notifier;
use crate::record::{IncompleteRecord, ResultRecord, ResultStore};
use crate::session::{Clock, InterviewSession, SessionKey};
use std::sync::Arc;
use tracing::{error, info, warn};

/// What to do with a session that ended before enough questions were
/// answered to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncompletePolicy {
    /// Log and drop the partial answers.
    Discard,
    /// Append an [`IncompleteRecord`] with the partial answers.
    Archive,
}

/// The result of one finalization attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    /// No session exists for the key; a previous trigger already cleared it.
    NoSession,
    /// The session's verdict was already delivered.
    AlreadyDone,
    /// Too few answers to evaluate; the session was cleared without a verdict.
    Incomplete { answered: usize },
    /// The application was evaluated and the result persisted.
    Delivered(Verdict),
}

/// Aggregates a finished session's answers, evaluates them exactly once,
/// persists the outcome, and clears the session.
pub struct Finalizer {
    decision: Arc<dyn DecisionService>,
    results: Arc<dyn ResultStore>,
    notifier: Option<Arc<dyn Notifier>>,
    catalog: Arc<QuestionCatalog>,
    min_answers: usize,
    incomplete_policy: IncompletePolicy,
    clock: Arc<dyn Clock>,
}

impl Finalizer {
    pub fn new(
        decision: Arc<dyn DecisionService>,
        results: Arc<dyn ResultStore>,
        notifier: Option<Arc<dyn Notifier>>,
        catalog: Arc<QuestionCatalog>,
        min_answers: usize,
        incomplete_policy: IncompletePolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            decision,
            results,
            notifier,
            catalog,
            min_answers,
            incomplete_policy,
            clock,
        }
    }

    /// Finalizes the session held in `slot_contents`.
    ///
    /// The caller MUST hold the session's slot lock for the duration of this
    /// call; that lock is what serializes the two trigger paths. Persistence
    /// and notification failures are logged and absorbed: the caller still
    /// has to produce a voice response within the gateway's budget.
    pub async fn finalize(
        &self,
        key: &SessionKey,
        slot_contents: &mut Option<InterviewSession>,
    ) -> FinalizeOutcome {
        match slot_contents.as_ref() {
            None => return FinalizeOutcome::NoSession,
            Some(session) if session.verdict_delivered => return FinalizeOutcome::AlreadyDone,
            Some(_) => {}
        }
        let Some(mut session) = slot_contents.take() else {
            return FinalizeOutcome::NoSession;
        };

        let questions = self.catalog.questions_for(key.application_type);
        let answered = session.responses.len();

        if answered < self.min_answers {
            info!(
                phone_number = %key.phone_number,
                application_type = %key.application_type,
                answered,
                required = self.min_answers,
                "Session ended with too few answers; skipping evaluation"
            );
            if self.incomplete_policy == IncompletePolicy::Archive {
                let record = IncompleteRecord {
                    name: session.customer_name.clone(),
                    phone_number: key.phone_number.clone(),
                    application_type: key.application_type,
                    answered,
                    responses: Self::keyed_responses(&session, questions),
                    timestamp: self.clock.now(),
                };
                if let Err(e) = self.results.archive_incomplete(&record).await {
                    error!(error = ?e, "Failed to archive incomplete session");
                }
            }
            return FinalizeOutcome::Incomplete { answered };
        }

        let application: ApplicationData = Self::keyed_responses(&session, questions);
        let verdict = match self
            .decision
            .evaluate(key.application_type, &application)
            .await
        {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = ?e, "Decision service failed; falling back to needs-verification");
                Verdict::NeedsVerification
            }
        };

        let record = ResultRecord {
            name: session.customer_name.clone(),
            phone_number: key.phone_number.clone(),
            application_type: key.application_type,
            decision: verdict,
            timestamp: self.clock.now(),
        };
        if let Err(e) = self.results.append(&record).await {
            error!(error = ?e, "Failed to persist result record");
        }
        session.verdict_delivered = true;

        info!(
            phone_number = %key.phone_number,
            application_type = %key.application_type,
            %verdict,
            answered,
            "Interview finalized"
        );

        if let Some(notifier) = &self.notifier {
            let message = notification_message(&session.customer_name, key, verdict);
            if let Err(e) = notifier.notify(&key.phone_number, &message).await {
                warn!(error = ?e, "Failed to send outcome notification");
            }
        }

        FinalizeOutcome::Delivered(verdict)
    }

    fn keyed_responses(
        session: &InterviewSession,
        questions: &[String],
    ) -> ApplicationData {
        let mut data = ApplicationData::new();
        for (index, answer) in &session.responses {
            if let Some(question) = questions.get(*index) {
                data.insert(canonical_key(question), answer.clone());
            }
        }
        data
    }
}

fn notification_message(name: &str, key: &SessionKey, verdict: Verdict) -> String {
    let body = match verdict {
        Verdict::Approved => "has been approved for processing. Our team will contact you with the next steps.",
        Verdict::Rejected => "could not be approved at this time.",
        Verdict::NeedsVerification => "requires a manual verification step. Our team will contact you shortly.",
    };
    format!(
        "Dear {}, your {} application {}",
        name,
        key.application_type.spoken_name(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ApplicationType;
    use crate::decision::MockDecisionService;
    use crate::gateway::MockNotifier;
    use crate::record::MockResultStore;
    use crate::session::SystemClock;
    use chrono::Utc;
    use tokio::sync::Mutex;

    fn key() -> SessionKey {
        SessionKey::new("+919999999999", ApplicationType::Loan)
    }

    fn session_with_answers(n: usize) -> InterviewSession {
        let mut session = InterviewSession::new("Asha", Utc::now());
        for i in 0..n {
            session.responses.insert(i, format!("answer {}", i));
        }
        session
    }

    fn finalizer(
        decision: MockDecisionService,
        results: MockResultStore,
        notifier: Option<MockNotifier>,
        policy: IncompletePolicy,
    ) -> Finalizer {
        Finalizer::new(
            Arc::new(decision),
            Arc::new(results),
            notifier.map(|n| Arc::new(n) as Arc<dyn Notifier>),
            Arc::new(QuestionCatalog::default()),
            5,
            policy,
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    async fn absent_session_is_a_noop() {
        let mut decision = MockDecisionService::new();
        decision.expect_evaluate().never();
        let mut results = MockResultStore::new();
        results.expect_append().never();
        results.expect_archive_incomplete().never();

        let f = finalizer(decision, results, None, IncompletePolicy::Discard);
        let mut slot = None;
        assert_eq!(f.finalize(&key(), &mut slot).await, FinalizeOutcome::NoSession);
    }

    #[tokio::test]
    async fn delivered_flag_short_circuits() {
        let mut decision = MockDecisionService::new();
        decision.expect_evaluate().never();
        let mut results = MockResultStore::new();
        results.expect_append().never();
        results.expect_archive_incomplete().never();

        let f = finalizer(decision, results, None, IncompletePolicy::Discard);
        let mut session = session_with_answers(10);
        session.verdict_delivered = true;
        let mut slot = Some(session);
        assert_eq!(
            f.finalize(&key(), &mut slot).await,
            FinalizeOutcome::AlreadyDone
        );
    }

    #[tokio::test]
    async fn too_few_answers_skips_evaluation_and_clears() {
        let mut decision = MockDecisionService::new();
        decision.expect_evaluate().never();
        let mut results = MockResultStore::new();
        results.expect_append().never();
        results.expect_archive_incomplete().never();

        let f = finalizer(decision, results, None, IncompletePolicy::Discard);
        let mut slot = Some(session_with_answers(3));
        assert_eq!(
            f.finalize(&key(), &mut slot).await,
            FinalizeOutcome::Incomplete { answered: 3 }
        );
        assert!(slot.is_none());
    }

    #[tokio::test]
    async fn archive_policy_persists_partial_answers() {
        let mut decision = MockDecisionService::new();
        decision.expect_evaluate().never();
        let mut results = MockResultStore::new();
        results.expect_append().never();
        results
            .expect_archive_incomplete()
            .withf(|record| {
                record.answered == 3
                    && record.phone_number == "+919999999999"
                    && record
                        .responses
                        .contains_key("what_is_your_current_age")
            })
            .times(1)
            .returning(|_| Ok(()));

        let f = finalizer(decision, results, None, IncompletePolicy::Archive);
        let mut slot = Some(session_with_answers(3));
        assert_eq!(
            f.finalize(&key(), &mut slot).await,
            FinalizeOutcome::Incomplete { answered: 3 }
        );
        assert!(slot.is_none());
    }

    #[tokio::test]
    async fn full_session_evaluates_persists_and_notifies() {
        let mut decision = MockDecisionService::new();
        decision
            .expect_evaluate()
            .withf(|app_type, application| {
                *app_type == ApplicationType::Loan
                    && application.get("what_is_your_current_age").map(String::as_str)
                        == Some("answer 0")
            })
            .times(1)
            .returning(|_, _| Ok(Verdict::Approved));
        let mut results = MockResultStore::new();
        results
            .expect_append()
            .withf(|record| {
                record.decision == Verdict::Approved
                    && record.phone_number == "+919999999999"
                    && record.application_type == ApplicationType::Loan
                    && record.name == "Asha"
            })
            .times(1)
            .returning(|_| Ok(()));
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|phone, message| phone == "+919999999999" && message.contains("approved"))
            .times(1)
            .returning(|_, _| Ok(()));

        let f = finalizer(decision, results, Some(notifier), IncompletePolicy::Discard);
        let mut slot = Some(session_with_answers(10));
        assert_eq!(
            f.finalize(&key(), &mut slot).await,
            FinalizeOutcome::Delivered(Verdict::Approved)
        );
        assert!(slot.is_none());
    }

    #[tokio::test]
    async fn decision_failure_falls_back_to_needs_verification() {
        let mut decision = MockDecisionService::new();
        decision
            .expect_evaluate()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("connection refused")));
        let mut results = MockResultStore::new();
        results
            .expect_append()
            .withf(|record| record.decision == Verdict::NeedsVerification)
            .times(1)
            .returning(|_| Ok(()));

        let f = finalizer(decision, results, None, IncompletePolicy::Discard);
        let mut slot = Some(session_with_answers(7));
        assert_eq!(
            f.finalize(&key(), &mut slot).await,
            FinalizeOutcome::Delivered(Verdict::NeedsVerification)
        );
    }

    #[tokio::test]
    async fn persistence_failure_still_delivers_the_verdict() {
        let mut decision = MockDecisionService::new();
        decision
            .expect_evaluate()
            .times(1)
            .returning(|_, _| Ok(Verdict::Rejected));
        let mut results = MockResultStore::new();
        results
            .expect_append()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("disk full")));

        let f = finalizer(decision, results, None, IncompletePolicy::Discard);
        let mut slot = Some(session_with_answers(6));
        assert_eq!(
            f.finalize(&key(), &mut slot).await,
            FinalizeOutcome::Delivered(Verdict::Rejected)
        );
    }

    #[tokio::test]
    async fn concurrent_triggers_persist_exactly_one_record() {
        let mut decision = MockDecisionService::new();
        decision
            .expect_evaluate()
            .times(1)
            .returning(|_, _| Ok(Verdict::Approved));
        let mut results = MockResultStore::new();
        results.expect_append().times(1).returning(|_| Ok(()));

        let f = Arc::new(finalizer(decision, results, None, IncompletePolicy::Discard));
        let slot = Arc::new(Mutex::new(Some(session_with_answers(10))));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let f = f.clone();
            let slot = slot.clone();
            handles.push(tokio::spawn(async move {
                let mut contents = slot.lock().await;
                f.finalize(&key(), &mut contents).await
            }));
        }
        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        assert!(outcomes.contains(&FinalizeOutcome::Delivered(Verdict::Approved)));
        assert!(outcomes.contains(&FinalizeOutcome::NoSession));
    }
}
