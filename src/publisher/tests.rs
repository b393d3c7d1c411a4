use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use super::*;
use crate::record::BuildInputs;
use crate::retry::Backoff;
use crate::store::StoreError;

const COMMIT: &str = "4f1b2c3d4e5f60718293a4b5c6d7e8f901234567";

/// Store that replays a script of failures, then accepts inserts.
#[derive(Default)]
struct ScriptedStore {
    script: RefCell<VecDeque<StoreError>>,
    calls: RefCell<u32>,
    documents: RefCell<Vec<(String, String)>>,
}

impl ScriptedStore {
    fn failing_with(errors: impl IntoIterator<Item = StoreError>) -> Self {
        Self {
            script: RefCell::new(errors.into_iter().collect()),
            ..Self::default()
        }
    }

    fn calls(&self) -> u32 {
        *self.calls.borrow()
    }

    fn documents(&self) -> Vec<(String, String)> {
        self.documents.borrow().clone()
    }
}

impl DocumentStore for ScriptedStore {
    fn atomic_insert(
        &self,
        partition: &str,
        record: &BuildRecord,
    ) -> std::result::Result<(), StoreError> {
        *self.calls.borrow_mut() += 1;
        if let Some(error) = self.script.borrow_mut().pop_front() {
            return Err(error);
        }
        self.documents
            .borrow_mut()
            .push((partition.to_string(), record.id().to_string()));
        Ok(())
    }
}

/// Store that persists the first insert but reports it as timed out, the way a
/// lost acknowledgement looks to the client.
#[derive(Default)]
struct LostAckStore {
    documents: RefCell<Vec<String>>,
    acked_once: RefCell<bool>,
}

impl DocumentStore for LostAckStore {
    fn atomic_insert(
        &self,
        _partition: &str,
        record: &BuildRecord,
    ) -> std::result::Result<(), StoreError> {
        let mut documents = self.documents.borrow_mut();
        if documents.iter().any(|id| id == record.id()) {
            return Err(StoreError::Conflict {
                id: record.id().to_string(),
            });
        }
        documents.push(record.id().to_string());

        let mut acked_once = self.acked_once.borrow_mut();
        if !*acked_once {
            *acked_once = true;
            return Err(StoreError::Timeout("response lost".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSleeper {
    delays: RefCell<Vec<Duration>>,
}

impl Sleeper for &RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.borrow_mut().push(duration);
    }
}

fn record() -> BuildRecord {
    BuildRecord::build(BuildInputs {
        raw_version: "1.85.0".to_string(),
        quality: "insiders".to_string(),
        commit_id: COMMIT.to_string(),
        source_branch: "refs/heads/main".to_string(),
        queued_by: "Release Bot".to_string(),
        is_private: false,
    })
    .unwrap()
}

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Backoff::Exponential {
            initial: Duration::from_millis(10),
            factor: 2,
            max: Duration::from_millis(50),
        },
    )
}

fn unavailable() -> StoreError {
    StoreError::Unavailable("503 Service Unavailable".into())
}

#[test]
fn test_first_attempt_success() {
    let store = ScriptedStore::default();
    let sleeper = RecordingSleeper::default();
    let publisher = RetryingPublisher::new(policy(3)).with_sleeper(&sleeper);

    let receipt = publisher.publish(&record(), &store).unwrap();

    assert_eq!(
        receipt,
        PublishReceipt {
            attempts: 1,
            outcome: PublishOutcome::Created
        }
    );
    assert_eq!(
        store.documents(),
        vec![("insiders".to_string(), COMMIT.to_string())]
    );
    assert!(sleeper.delays.borrow().is_empty());
}

#[test]
fn test_recovers_after_transient_failures() {
    let store = ScriptedStore::failing_with([
        unavailable(),
        StoreError::Timeout("connect".into()),
        StoreError::Throttled { retry_after: None },
    ]);
    let sleeper = RecordingSleeper::default();
    let publisher = RetryingPublisher::new(policy(5)).with_sleeper(&sleeper);

    let receipt = publisher.publish(&record(), &store).unwrap();

    assert_eq!(receipt.attempts, 4);
    assert_eq!(receipt.outcome, PublishOutcome::Created);
    assert_eq!(store.calls(), 4);
    assert_eq!(store.documents().len(), 1);
    assert_eq!(
        *sleeper.delays.borrow(),
        vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(40),
        ]
    );
}

#[test]
fn test_exhausts_after_max_attempts() {
    let store = ScriptedStore::failing_with((0..10).map(|_| unavailable()));
    let sleeper = RecordingSleeper::default();
    let publisher = RetryingPublisher::new(policy(4)).with_sleeper(&sleeper);

    let result = publisher.publish(&record(), &store);

    match result {
        Err(PublishError::Exhausted { attempts, last }) => {
            assert_eq!(attempts, 4);
            assert_eq!(last, unavailable());
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(store.calls(), 4);
    assert!(store.documents().is_empty());

    let delays = sleeper.delays.borrow();
    assert_eq!(delays.len(), 3);
    assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(delays.iter().all(|delay| *delay <= Duration::from_millis(50)));
}

#[test]
fn test_fatal_error_is_not_retried() {
    for fatal in [
        StoreError::Unauthorized("403 Forbidden".into()),
        StoreError::Rejected {
            status: Some(400),
            message: "malformed".into(),
        },
    ] {
        let store = ScriptedStore::failing_with([fatal.clone()]);
        let sleeper = RecordingSleeper::default();
        let publisher = RetryingPublisher::new(policy(5)).with_sleeper(&sleeper);

        let result = publisher.publish(&record(), &store);

        match result {
            Err(PublishError::Fatal { partition, source }) => {
                assert_eq!(partition, "insiders");
                assert_eq!(source, fatal);
            }
            other => panic!("expected fatal error, got {other:?}"),
        }
        assert_eq!(store.calls(), 1);
        assert!(sleeper.delays.borrow().is_empty());
    }
}

#[test]
fn test_conflict_counts_as_success() {
    let store = ScriptedStore::failing_with([StoreError::Conflict {
        id: COMMIT.to_string(),
    }]);
    let sleeper = RecordingSleeper::default();
    let publisher = RetryingPublisher::new(policy(3)).with_sleeper(&sleeper);

    let receipt = publisher.publish(&record(), &store).unwrap();

    assert_eq!(receipt.attempts, 1);
    assert_eq!(receipt.outcome, PublishOutcome::AlreadyExisted);
    assert_eq!(store.calls(), 1);
}

#[test]
fn test_conflict_after_transient_counts_as_success() {
    let store = ScriptedStore::failing_with([
        unavailable(),
        StoreError::Conflict {
            id: COMMIT.to_string(),
        },
    ]);
    let sleeper = RecordingSleeper::default();
    let publisher = RetryingPublisher::new(policy(3)).with_sleeper(&sleeper);

    let receipt = publisher.publish(&record(), &store).unwrap();

    assert_eq!(receipt.attempts, 2);
    assert_eq!(receipt.outcome, PublishOutcome::AlreadyExisted);
}

#[test]
fn test_conflict_is_success_even_if_predicate_would_retry_it() {
    let store = ScriptedStore::failing_with([StoreError::Conflict {
        id: COMMIT.to_string(),
    }]);
    let sleeper = RecordingSleeper::default();
    let publisher = RetryingPublisher::new(policy(3).with_retryable(|_| true))
        .with_sleeper(&sleeper);

    let receipt = publisher.publish(&record(), &store).unwrap();
    assert_eq!(receipt.outcome, PublishOutcome::AlreadyExisted);
}

#[test]
fn test_lost_acknowledgement_stores_exactly_one_document() {
    let store = LostAckStore::default();
    let sleeper = RecordingSleeper::default();
    let publisher = RetryingPublisher::new(policy(3)).with_sleeper(&sleeper);

    let receipt = publisher.publish(&record(), &store).unwrap();

    assert_eq!(receipt.attempts, 2);
    assert_eq!(receipt.outcome, PublishOutcome::AlreadyExisted);
    assert_eq!(*store.documents.borrow(), vec![COMMIT.to_string()]);
}

#[test]
fn test_delays_never_shrink_under_throttle_hints() {
    let store = ScriptedStore::failing_with([
        StoreError::Throttled {
            retry_after: Some(Duration::from_millis(45)),
        },
        StoreError::Throttled {
            retry_after: Some(Duration::from_millis(1)),
        },
        unavailable(),
    ]);
    let sleeper = RecordingSleeper::default();
    let publisher = RetryingPublisher::new(policy(5)).with_sleeper(&sleeper);

    publisher.publish(&record(), &store).unwrap();

    assert_eq!(
        *sleeper.delays.borrow(),
        vec![
            Duration::from_millis(45),
            Duration::from_millis(45),
            Duration::from_millis(45),
        ]
    );
}

#[test]
fn test_single_attempt_policy_exhausts_immediately() {
    let store = ScriptedStore::failing_with([unavailable()]);
    let sleeper = RecordingSleeper::default();
    let publisher = RetryingPublisher::new(policy(1)).with_sleeper(&sleeper);

    let result = publisher.publish(&record(), &store);

    assert!(matches!(
        result,
        Err(PublishError::Exhausted { attempts: 1, .. })
    ));
    assert!(sleeper.delays.borrow().is_empty());
}
