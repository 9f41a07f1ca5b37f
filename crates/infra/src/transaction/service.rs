//! Retrying transaction helper.

use tracing::debug;

use rendition_events::{UnitOfWork, UnitOfWorkError};

use super::retry::{RetryPolicy, with_retry};

/// Errors that can tell whether a fresh attempt might succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Runs bodies inside units of work, retrying transient failures.
///
/// Every call opens a new unit of work per attempt; there is no ambient
/// transaction to join. Listeners bound during a failed attempt are told
/// about the rollback, so nothing buffered by that attempt survives it.
#[derive(Debug, Clone, Default)]
pub struct TransactionService {
    policy: RetryPolicy,
}

impl TransactionService {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `body` in a new unit of work, committing on `Ok`.
    ///
    /// On `Err` the unit of work is rolled back and, if the error is
    /// retryable and attempts remain, `body` runs again from the start in a
    /// brand new unit of work.
    pub fn run_in_transaction<T, E, F>(&self, mut body: F) -> Result<T, E>
    where
        F: FnMut(&UnitOfWork) -> Result<T, E>,
        E: Retryable + From<UnitOfWorkError> + core::fmt::Display,
    {
        with_retry(&self.policy, Retryable::is_retryable, |attempt| {
            let uow = UnitOfWork::begin();
            debug!(uow = %uow.id(), attempt, "transaction attempt started");

            match body(&uow) {
                Ok(value) => {
                    uow.commit()?;
                    Ok(value)
                }
                Err(err) => {
                    uow.rollback();
                    Err(err)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use rendition_events::{TransactionListener, UnitOfWorkState};
    use thiserror::Error;

    use super::*;

    #[derive(Debug, Error, PartialEq)]
    enum TestError {
        #[error("conflict")]
        Conflict,
        #[error("fatal")]
        Fatal,
        #[error(transparent)]
        UnitOfWork(#[from] UnitOfWorkError),
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Conflict)
        }
    }

    #[derive(Default)]
    struct Outcomes {
        events: Mutex<Vec<&'static str>>,
    }

    impl TransactionListener for Outcomes {
        fn key(&self) -> &str {
            "outcomes"
        }

        fn after_commit(&self, _uow: &UnitOfWork) {
            self.events.lock().unwrap().push("commit");
        }

        fn after_rollback(&self, _uow: &UnitOfWork) {
            self.events.lock().unwrap().push("rollback");
        }
    }

    fn service(max_attempts: u32) -> TransactionService {
        TransactionService::new(RetryPolicy::fixed(max_attempts, Duration::ZERO))
    }

    #[test]
    fn transient_failures_rerun_in_a_fresh_unit_of_work() {
        let outcomes = Arc::new(Outcomes::default());
        let mut seen = Vec::new();

        let result: Result<&str, TestError> = service(3).run_in_transaction(|uow| {
            assert_eq!(uow.state(), UnitOfWorkState::Active);
            uow.bind_listener(outcomes.clone())?;
            seen.push(uow.id());
            if seen.len() < 3 {
                Err(TestError::Conflict)
            } else {
                Ok("done")
            }
        });

        assert_eq!(result, Ok("done"));
        assert_eq!(seen.len(), 3);
        assert_ne!(seen[0], seen[1]);
        assert_eq!(
            *outcomes.events.lock().unwrap(),
            vec!["rollback", "rollback", "commit"]
        );
    }

    #[test]
    fn fatal_errors_roll_back_once() {
        let outcomes = Arc::new(Outcomes::default());
        let mut runs = 0;

        let result: Result<(), TestError> = service(5).run_in_transaction(|uow| {
            runs += 1;
            uow.bind_listener(outcomes.clone())?;
            Err(TestError::Fatal)
        });

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(runs, 1);
        assert_eq!(*outcomes.events.lock().unwrap(), vec!["rollback"]);
    }

    #[test]
    fn conflicts_give_up_after_the_policy_bound() {
        let mut runs = 0;

        let result: Result<(), TestError> = service(4).run_in_transaction(|_uow| {
            runs += 1;
            Err(TestError::Conflict)
        });

        assert_eq!(result, Err(TestError::Conflict));
        assert_eq!(runs, 4);
    }
}
