//! Batch classification.
//!
//! A failure on one record never aborts the batch: the record is emitted as
//! `(no_reply, 0.0, "Unknown")` and the failure is reported in
//! `BatchOutcome::failures`. Panics inside a classifier count as failures.
//! Setting the interrupt flag stops intake; everything produced up to that
//! point is returned fully classified.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::pipeline::classifier::PatternClassifier;
use crate::pipeline::types::{ClassifiedEmail, EmailRecord};

/// Per-record classification seam.
pub trait RecordClassifier: Send + Sync {
    fn classify_record(&self, record: &EmailRecord) -> Result<ClassifiedEmail, PipelineError>;
}

impl RecordClassifier for PatternClassifier {
    fn classify_record(&self, record: &EmailRecord) -> Result<ClassifiedEmail, PipelineError> {
        Ok(PatternClassifier::classify_record(self, record))
    }
}

/// A record whose classification failed and was defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub id: String,
    pub reason: String,
}

/// Result of classifying a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// One entry per consumed record, in input order.
    pub emails: Vec<ClassifiedEmail>,
    pub failures: Vec<BatchFailure>,
    /// Intake stopped before every record was consumed.
    pub interrupted: bool,
}

impl BatchOutcome {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    fn absorb(&mut self, other: BatchOutcome) {
        self.emails.extend(other.emails);
        self.failures.extend(other.failures);
        self.interrupted |= other.interrupted;
    }
}

/// Classify every record sequentially.
pub fn classify_all<C>(classifier: &C, records: &[EmailRecord]) -> BatchOutcome
where
    C: RecordClassifier + ?Sized,
{
    classify_until(classifier, records, &AtomicBool::new(false))
}

/// Classify records sequentially until `interrupt` is raised.
pub fn classify_until<C>(
    classifier: &C,
    records: &[EmailRecord],
    interrupt: &AtomicBool,
) -> BatchOutcome
where
    C: RecordClassifier + ?Sized,
{
    let mut outcome = BatchOutcome {
        emails: Vec::with_capacity(records.len()),
        ..Default::default()
    };

    for record in records {
        if interrupt.load(Ordering::Relaxed) {
            outcome.interrupted = true;
            break;
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| classifier.classify_record(record)))
            .unwrap_or_else(|payload| {
                Err(PipelineError::Classification {
                    id: record.id.clone(),
                    reason: panic_message(payload.as_ref()),
                })
            });

        match result {
            Ok(classified) => outcome.emails.push(classified),
            Err(e) => {
                warn!(id = %record.id, error = %e, "Classification failed, defaulting record");
                outcome.failures.push(BatchFailure {
                    id: record.id.clone(),
                    reason: e.to_string(),
                });
                outcome.emails.push(ClassifiedEmail::defaulted(record.clone()));
            }
        }
    }

    outcome
}

/// Scatter records over blocking worker tasks and gather them back in input order.
pub async fn classify_parallel<C>(
    classifier: Arc<C>,
    records: Vec<EmailRecord>,
    workers: usize,
    interrupt: Arc<AtomicBool>,
) -> BatchOutcome
where
    C: RecordClassifier + 'static,
{
    let total = records.len();
    if total == 0 {
        return BatchOutcome::default();
    }

    let workers = workers.clamp(1, total);
    let chunk_size = total.div_ceil(workers);
    let chunks: Vec<Arc<[EmailRecord]>> = records
        .chunks(chunk_size)
        .map(Arc::<[EmailRecord]>::from)
        .collect();

    info!(total, workers, chunk_size, "Classifying batch in parallel");

    let mut tasks = JoinSet::new();
    for (index, chunk) in chunks.iter().enumerate() {
        let classifier = Arc::clone(&classifier);
        let chunk = Arc::clone(chunk);
        let interrupt = Arc::clone(&interrupt);
        tasks.spawn_blocking(move || (index, classify_until(classifier.as_ref(), &chunk, &interrupt)));
    }

    let mut gathered: Vec<Option<BatchOutcome>> = vec![None; chunks.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => gathered[index] = Some(outcome),
            Err(e) => error!(error = %e, "Classification worker did not complete"),
        }
    }

    let mut outcome = BatchOutcome::default();
    for (index, slot) in gathered.into_iter().enumerate() {
        match slot {
            Some(part) => outcome.absorb(part),
            None => outcome.absorb(defaulted_chunk(&chunks[index])),
        }
    }

    info!(
        classified = outcome.emails.len(),
        failures = outcome.failure_count(),
        interrupted = outcome.interrupted,
        total,
        "Batch classification complete"
    );
    outcome
}

/// Outcome for a chunk whose worker died: every record defaulted and reported.
fn defaulted_chunk(records: &[EmailRecord]) -> BatchOutcome {
    let reason = PipelineError::Worker("worker task did not complete".into()).to_string();
    BatchOutcome {
        emails: records.iter().cloned().map(ClassifiedEmail::defaulted).collect(),
        failures: records
            .iter()
            .map(|r| BatchFailure {
                id: r.id.clone(),
                reason: reason.clone(),
            })
            .collect(),
        interrupted: false,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::StatusCategory;

    /// Wraps the real classifier and fails on one id.
    struct FailingOn {
        inner: PatternClassifier,
        id: String,
        panic: bool,
    }

    impl RecordClassifier for FailingOn {
        fn classify_record(&self, record: &EmailRecord) -> Result<ClassifiedEmail, PipelineError> {
            if record.id == self.id {
                if self.panic {
                    panic!("boom");
                }
                return Err(PipelineError::Classification {
                    id: record.id.clone(),
                    reason: "injected".into(),
                });
            }
            RecordClassifier::classify_record(&self.inner, record)
        }
    }

    /// Raises the interrupt after classifying a given id.
    struct InterruptAfter {
        inner: PatternClassifier,
        id: String,
        flag: Arc<AtomicBool>,
    }

    impl RecordClassifier for InterruptAfter {
        fn classify_record(&self, record: &EmailRecord) -> Result<ClassifiedEmail, PipelineError> {
            if record.id == self.id {
                self.flag.store(true, Ordering::Relaxed);
            }
            RecordClassifier::classify_record(&self.inner, record)
        }
    }

    fn records(n: usize) -> Vec<EmailRecord> {
        (0..n)
            .map(|i| {
                let (subject, body) = match i % 4 {
                    0 => ("Job Offer", "We are pleased to offer you the position"),
                    1 => ("First Interview", "Phone screen next week"),
                    2 => ("Application Update", "We regret to inform you"),
                    _ => ("Newsletter", "Check out our latest products"),
                };
                EmailRecord::new(subject, format!("hr@company{}.com", i % 7), body)
                    .with_id(format!("r{i}"))
            })
            .collect()
    }

    #[test]
    fn classify_all_preserves_order_and_ids() {
        let classifier = PatternClassifier::new().unwrap();
        let input = records(8);
        let outcome = classify_all(&classifier, &input);
        assert_eq!(outcome.emails.len(), 8);
        assert!(outcome.failures.is_empty());
        for (record, classified) in input.iter().zip(&outcome.emails) {
            assert_eq!(record.id, classified.record.id);
        }
        assert_eq!(outcome.emails[0].status, StatusCategory::Offer);
        assert_eq!(outcome.emails[3].status, StatusCategory::NotJobRelated);
    }

    #[test]
    fn one_failure_is_isolated() {
        let input = records(1000);
        let reference = classify_all(&PatternClassifier::new().unwrap(), &input);
        let failing = FailingOn {
            inner: PatternClassifier::new().unwrap(),
            id: "r500".into(),
            panic: false,
        };
        let outcome = classify_all(&failing, &input);

        assert_eq!(outcome.emails.len(), 1000);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].id, "r500");
        for (i, (got, want)) in outcome.emails.iter().zip(&reference.emails).enumerate() {
            if i == 500 {
                assert_eq!(got.status, StatusCategory::NoReply);
                assert_eq!(got.confidence, 0.0);
                assert_eq!(got.company, "Unknown");
            } else {
                assert_eq!(got, want);
            }
        }
    }

    #[test]
    fn panic_is_treated_as_failure() {
        let failing = FailingOn {
            inner: PatternClassifier::new().unwrap(),
            id: "r1".into(),
            panic: true,
        };
        let outcome = classify_all(&failing, &records(3));
        assert_eq!(outcome.emails.len(), 3);
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].reason.contains("boom"));
    }

    #[test]
    fn interrupt_stops_intake() {
        let flag = Arc::new(AtomicBool::new(false));
        let classifier = InterruptAfter {
            inner: PatternClassifier::new().unwrap(),
            id: "r4".into(),
            flag: Arc::clone(&flag),
        };
        let outcome = classify_until(&classifier, &records(10), &flag);
        assert!(outcome.interrupted);
        assert_eq!(outcome.emails.len(), 5);
    }

    #[test]
    fn empty_batch_is_empty() {
        let outcome = classify_all(&PatternClassifier::new().unwrap(), &[]);
        assert!(outcome.emails.is_empty());
        assert!(!outcome.interrupted);
    }

    #[tokio::test]
    async fn parallel_matches_sequential() {
        let classifier = Arc::new(PatternClassifier::new().unwrap());
        let input = records(103);
        let sequential = classify_all(classifier.as_ref(), &input);
        let parallel = classify_parallel(
            Arc::clone(&classifier),
            input,
            4,
            Arc::new(AtomicBool::new(false)),
        )
        .await;
        assert_eq!(parallel.emails, sequential.emails);
        assert!(!parallel.interrupted);
    }

    #[tokio::test]
    async fn parallel_isolates_failures() {
        let failing = Arc::new(FailingOn {
            inner: PatternClassifier::new().unwrap(),
            id: "r42".into(),
            panic: true,
        });
        let outcome =
            classify_parallel(failing, records(100), 8, Arc::new(AtomicBool::new(false))).await;
        assert_eq!(outcome.emails.len(), 100);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.emails[42].record.id, "r42");
        assert_eq!(outcome.emails[42].status, StatusCategory::NoReply);
    }

    #[tokio::test]
    async fn parallel_with_raised_interrupt_returns_nothing() {
        let classifier = Arc::new(PatternClassifier::new().unwrap());
        let outcome =
            classify_parallel(classifier, records(20), 2, Arc::new(AtomicBool::new(true))).await;
        assert!(outcome.interrupted);
        assert!(outcome.emails.is_empty());
    }

    #[tokio::test]
    async fn parallel_interrupt_mid_run_keeps_chunk_prefixes() {
        use crate::analytics::StatusHistogram;
        use crate::funnel::{CompanyFlowResolver, FlowGraphBuilder};

        let flag = Arc::new(AtomicBool::new(false));
        let classifier = Arc::new(InterruptAfter {
            inner: PatternClassifier::new().unwrap(),
            id: "r3".into(),
            flag: Arc::clone(&flag),
        });
        // Two chunks: r0..r9 and r10..r19.
        let outcome = classify_parallel(classifier, records(20), 2, flag).await;

        assert!(outcome.interrupted);
        assert!(outcome.failures.is_empty());
        let ids: Vec<_> = outcome.emails.iter().map(|e| e.record.id.as_str()).collect();
        // The interrupting chunk stops right after r3; the other keeps a prefix of its own.
        assert_eq!(&ids[..4], ["r0", "r1", "r2", "r3"]);
        let second: Vec<_> = (10..20).map(|i| format!("r{i}")).collect();
        let tail = &ids[4..];
        assert!(tail.len() <= second.len());
        for (got, want) in tail.iter().zip(&second) {
            assert_eq!(*got, want.as_str());
        }
        assert!(ids.len() < 20);

        let flows = CompanyFlowResolver.resolve(&outcome.emails);
        let graph = FlowGraphBuilder.build(
            &flows,
            StatusHistogram::from_emails(&outcome.emails).source_counts(),
        );
        assert!(graph.is_conserved(), "{graph:#?}");
    }

    #[tokio::test]
    async fn parallel_handles_empty_input() {
        let classifier = Arc::new(PatternClassifier::new().unwrap());
        let outcome =
            classify_parallel(classifier, Vec::new(), 4, Arc::new(AtomicBool::new(false))).await;
        assert!(outcome.emails.is_empty());
    }
}
