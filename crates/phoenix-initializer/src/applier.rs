//! DDL applier

use crate::plan::StatementPlan;
use crate::reporter::{Reporter, RunEvent, TracingReporter};
use phoenix_catalog::Session;
use phoenix_common::{ApplyResult, PhoenixError, Statement};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// The statement that stopped an apply and why
#[derive(Debug)]
pub struct ApplyFailure {
    pub statement: Statement,
    pub error: PhoenixError,
    /// False when the run was cancelled before the statement was sent
    pub attempted: bool,
}

/// Results of every attempted statement, in plan order
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub results: Vec<ApplyResult>,
    pub failure: Option<ApplyFailure>,
}

impl ApplyOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn applied(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded).count()
    }
}

/// Runs a [`StatementPlan`] in ordinal order and stops at the first failure
pub struct DdlApplier {
    reporter: Arc<dyn Reporter>,
    cancel: Option<watch::Receiver<bool>>,
}

impl DdlApplier {
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            reporter,
            cancel: None,
        }
    }

    /// Stop before the next statement once `cancel` reads `true`
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Apply `plan` on `session`.
    ///
    /// Statements after a failure are not attempted and have no entry in the
    /// returned results.
    pub async fn apply(&self, session: &mut dyn Session, plan: &StatementPlan) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        for statement in plan.statements() {
            if self.is_cancelled() {
                outcome.failure = Some(ApplyFailure {
                    statement: statement.clone(),
                    error: PhoenixError::Cancelled,
                    attempted: false,
                });
                break;
            }

            debug!("Applying {}: {}", statement, statement.text);
            match session.execute(&statement.text).await {
                Ok(()) => {
                    outcome.results.push(ApplyResult::success(&statement.name));
                    self.reporter
                        .report(&RunEvent::StatementApplied { statement });
                }
                Err(e) => {
                    let error = e.into_statement_error(&statement.name);
                    outcome
                        .results
                        .push(ApplyResult::failure(&statement.name, error.to_string()));
                    outcome.failure = Some(ApplyFailure {
                        statement: statement.clone(),
                        error,
                        attempted: true,
                    });
                    break;
                }
            }
        }

        outcome
    }
}

impl Default for DdlApplier {
    fn default() -> Self {
        Self::new(Arc::new(TracingReporter))
    }
}
