//! Initializer - drives one bootstrap run from connect to completion

use crate::applier::DdlApplier;
use crate::identity::verify_identity;
use crate::plan::StatementPlan;
use crate::reporter::{Reporter, RunEvent, TracingReporter};
use chrono::{DateTime, Utc};
use phoenix_catalog::{Connector, Session};
use phoenix_common::{
    ApplyResult, ConnectionConfig, PhoenixError, RunId, RunStage, RunState,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// What a run did
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    pub results: Vec<ApplyResult>,
    /// Whether rerunning unchanged may succeed
    pub retryable: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn failed_stage(&self) -> Option<&RunStage> {
        match &self.state {
            RunState::Failed { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

/// Tracks state transitions and turns them into a report
struct RunTracker {
    report: RunReport,
    reporter: Arc<dyn Reporter>,
}

impl RunTracker {
    fn new(reporter: Arc<dyn Reporter>) -> Self {
        let now = Utc::now();
        Self {
            report: RunReport {
                run_id: RunId::new(),
                state: RunState::NotStarted,
                principal: None,
                results: vec![],
                retryable: false,
                started_at: now,
                finished_at: now,
            },
            reporter,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.report.state.can_transition_to(&next),
            "illegal transition {} -> {}",
            self.report.state,
            next
        );
        tracing::debug!("{}: {} -> {}", self.report.run_id, self.report.state, next);
        self.report.state = next;
    }

    fn fail(&mut self, stage: RunStage, error: PhoenixError) {
        self.reporter.report(&RunEvent::Failed {
            stage: &stage,
            error: &error,
        });
        self.report.retryable = error.is_retryable();
        self.advance(RunState::Failed {
            stage,
            cause: error.to_string(),
        });
    }

    fn finish(mut self) -> RunReport {
        self.report.finished_at = Utc::now();
        self.report
    }
}

/// Connects, verifies the principal and applies a [`StatementPlan`].
///
/// Every run is single-pass; the session it opens is closed exactly once on
/// every exit path.
pub struct Initializer {
    connector: Arc<dyn Connector>,
    plan: StatementPlan,
    reporter: Arc<dyn Reporter>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Initializer {
    pub fn new(connector: Arc<dyn Connector>, plan: StatementPlan) -> Self {
        Self {
            connector,
            plan,
            reporter: Arc::new(TracingReporter),
            cancel: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Abandon the run at the next step boundary once `cancel` reads `true`
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn plan(&self) -> &StatementPlan {
        &self.plan
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    pub async fn run(&self, config: &ConnectionConfig) -> RunReport {
        let mut tracker = RunTracker::new(self.reporter.clone());
        tracing::info!(
            "Starting {} against {} ({} statements)",
            tracker.report.run_id,
            config.dsn(),
            self.plan.len()
        );

        if self.is_cancelled() {
            tracker.fail(RunStage::Connect, PhoenixError::Cancelled);
            return tracker.finish();
        }

        let run_id = tracker.report.run_id;
        let mut session = match self.connector.connect_for_run(config, &run_id).await {
            Ok(session) => session,
            Err(e) => {
                tracker.fail(RunStage::Connect, e);
                return tracker.finish();
            }
        };
        tracker.advance(RunState::Connected);
        let dsn = config.dsn();
        self.reporter.report(&RunEvent::Connected { dsn: &dsn });

        self.drive(session.as_mut(), &mut tracker).await;

        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close session for {}: {}", tracker.report.run_id, e);
        }
        tracker.finish()
    }

    /// Identity check and apply on an open session
    async fn drive(&self, session: &mut dyn Session, tracker: &mut RunTracker) {
        if self.is_cancelled() {
            tracker.fail(RunStage::IdentityCheck, PhoenixError::Cancelled);
            return;
        }
        let principal = match verify_identity(session).await {
            Ok(principal) => principal,
            Err(e) => {
                tracker.fail(RunStage::IdentityCheck, e);
                return;
            }
        };
        tracker.advance(RunState::IdentityVerified);
        self.reporter.report(&RunEvent::IdentityVerified {
            principal: &principal,
        });
        tracker.report.principal = Some(principal);

        let mut applier = DdlApplier::new(self.reporter.clone());
        if let Some(cancel) = &self.cancel {
            applier = applier.with_cancellation(cancel.clone());
        }
        let outcome = applier.apply(session, &self.plan).await;

        for statement in &self.plan.statements()[..outcome.results.len()] {
            tracker.advance(RunState::Applying {
                ordinal: statement.ordinal,
            });
        }
        let applied = outcome.applied();
        tracker.report.results = outcome.results;

        match outcome.failure {
            None => {
                tracker.advance(RunState::Completed);
                self.reporter.report(&RunEvent::Completed { applied });
            }
            Some(failure) => tracker.fail(
                RunStage::Applying {
                    ordinal: failure.statement.ordinal,
                    name: failure.statement.name,
                },
                failure.error,
            ),
        }
    }
}
