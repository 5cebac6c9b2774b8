//! Phoenix error types

use thiserror::Error;

/// How a DDL statement failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementErrorKind {
    /// The service refused the statement (syntax, semantics, permissions).
    Rejected,
    /// The service accepted the statement but failed while running it.
    Failed,
    /// The connection to the service broke while the statement was in flight.
    Transport,
}

impl std::fmt::Display for StatementErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatementErrorKind::Rejected => write!(f, "rejected"),
            StatementErrorKind::Failed => write!(f, "failed"),
            StatementErrorKind::Transport => write!(f, "transport"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PhoenixError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Statement '{name}' {kind}: {cause}")]
    Statement {
        name: String,
        kind: StatementErrorKind,
        cause: String,
    },

    #[error("Invalid statement plan: {0}")]
    InvalidPlan(String),

    #[error("SQL parsing error: {0}")]
    SqlParse(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PhoenixError {
    pub fn statement(
        name: impl Into<String>,
        kind: StatementErrorKind,
        cause: impl Into<String>,
    ) -> Self {
        PhoenixError::Statement {
            name: name.into(),
            kind,
            cause: cause.into(),
        }
    }

    /// Whether rerunning the whole bootstrap may succeed without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PhoenixError::Connection(_)
                | PhoenixError::Statement {
                    kind: StatementErrorKind::Transport,
                    ..
                }
        )
    }

    /// Attach a statement name to an error raised by a session while executing it.
    ///
    /// Errors that already carry a statement keep their kind; connection-level
    /// errors become transport failures and everything else is treated as a
    /// service-side failure.
    pub fn into_statement_error(self, name: &str) -> Self {
        match self {
            PhoenixError::Statement { kind, cause, .. } => PhoenixError::statement(name, kind, cause),
            PhoenixError::Connection(cause) => {
                PhoenixError::statement(name, StatementErrorKind::Transport, cause)
            }
            PhoenixError::SqlParse(cause) => {
                PhoenixError::statement(name, StatementErrorKind::Rejected, cause)
            }
            PhoenixError::Cancelled => PhoenixError::Cancelled,
            other => PhoenixError::statement(name, StatementErrorKind::Failed, other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PhoenixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(PhoenixError::Connection("refused".into()).is_retryable());
        assert!(PhoenixError::statement("s", StatementErrorKind::Transport, "reset").is_retryable());
        assert!(!PhoenixError::statement("s", StatementErrorKind::Rejected, "syntax").is_retryable());
        assert!(!PhoenixError::Query("no rows".into()).is_retryable());
        assert!(!PhoenixError::Config("empty host".into()).is_retryable());
    }

    #[test]
    fn test_into_statement_error() {
        let err = PhoenixError::Connection("broken pipe".into()).into_statement_error("create_schema");
        match err {
            PhoenixError::Statement { name, kind, .. } => {
                assert_eq!(name, "create_schema");
                assert_eq!(kind, StatementErrorKind::Transport);
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = PhoenixError::SqlParse("Expected TABLE".into()).into_statement_error("t");
        assert!(matches!(
            err,
            PhoenixError::Statement {
                kind: StatementErrorKind::Rejected,
                ..
            }
        ));

        assert!(matches!(
            PhoenixError::Cancelled.into_statement_error("t"),
            PhoenixError::Cancelled
        ));
    }

    #[test]
    fn test_statement_display() {
        let err = PhoenixError::statement("create_table_event", StatementErrorKind::Rejected, "line 1:8: mismatched input");
        assert_eq!(
            err.to_string(),
            "Statement 'create_table_event' rejected: line 1:8: mismatched input"
        );
    }
}
