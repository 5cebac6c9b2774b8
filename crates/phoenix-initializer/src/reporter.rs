//! Status reporting sinks

use parking_lot::Mutex;
use phoenix_common::{PhoenixError, RunStage, Statement};

/// One step of a run worth telling the operator about
#[derive(Debug)]
pub enum RunEvent<'a> {
    Connected { dsn: &'a str },
    IdentityVerified { principal: &'a str },
    StatementApplied { statement: &'a Statement },
    Completed { applied: usize },
    Failed { stage: &'a RunStage, error: &'a PhoenixError },
}

impl RunEvent<'_> {
    pub fn is_failure(&self) -> bool {
        matches!(self, RunEvent::Failed { .. })
    }
}

impl std::fmt::Display for RunEvent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunEvent::Connected { dsn } => write!(f, "Connected to {dsn}"),
            RunEvent::IdentityVerified { principal } => write!(f, "Current user: {principal}"),
            RunEvent::StatementApplied { statement } => {
                write!(f, "Applied #{} {}", statement.ordinal, statement.name)
            }
            RunEvent::Completed { applied } => {
                write!(f, "Initialization complete ({applied} statements applied)")
            }
            RunEvent::Failed { stage, error } => write!(f, "Failed at {stage}: {error}"),
        }
    }
}

/// Receives exactly one event per completed step and one per failure
pub trait Reporter: Send + Sync {
    fn report(&self, event: &RunEvent<'_>);
}

/// Emits events as `tracing` records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: &RunEvent<'_>) {
        if event.is_failure() {
            tracing::error!("{}", event);
        } else {
            tracing::info!("{}", event);
        }
    }
}

/// Prints one plain status line per event
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, event: &RunEvent<'_>) {
        if event.is_failure() {
            eprintln!("{event}");
        } else {
            println!("{event}");
        }
    }
}

/// Keeps status lines in memory
#[derive(Debug, Default)]
pub struct CollectingReporter {
    lines: Mutex<Vec<String>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl Reporter for CollectingReporter {
    fn report(&self, event: &RunEvent<'_>) {
        self.lines.lock().push(event.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        let reporter = CollectingReporter::new();
        let statement = Statement::new(1, "iceberg.phoenix", "CREATE SCHEMA IF NOT EXISTS iceberg.phoenix");
        let stage = RunStage::IdentityCheck;
        let error = PhoenixError::Query("identity probe returned no rows".to_string());

        reporter.report(&RunEvent::Connected {
            dsn: "http://admin@localhost:8080/iceberg",
        });
        reporter.report(&RunEvent::IdentityVerified { principal: "admin" });
        reporter.report(&RunEvent::StatementApplied {
            statement: &statement,
        });
        reporter.report(&RunEvent::Failed {
            stage: &stage,
            error: &error,
        });

        assert_eq!(
            reporter.lines(),
            vec![
                "Connected to http://admin@localhost:8080/iceberg",
                "Current user: admin",
                "Applied #1 iceberg.phoenix",
                "Failed at identity check: Query error: identity probe returned no rows",
            ]
        );
    }
}
