//! Phoenix core types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of one bootstrap run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run_{}", self.0.simple())
    }
}

/// A named, idempotent DDL operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// 1-based position in the plan
    pub ordinal: u32,
    pub name: String,
    pub text: String,
}

impl Statement {
    pub fn new(ordinal: u32, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            ordinal,
            name: name.into(),
            text: text.into(),
        }
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {}", self.ordinal, self.name)
    }
}

/// Outcome of one attempted statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub name: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApplyResult {
    pub fn success(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            succeeded: true,
            error: None,
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            succeeded: false,
            error: Some(error.into()),
        }
    }
}

/// Stage of a run at which it failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum RunStage {
    Connect,
    IdentityCheck,
    Applying { ordinal: u32, name: String },
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStage::Connect => write!(f, "connect"),
            RunStage::IdentityCheck => write!(f, "identity check"),
            RunStage::Applying { ordinal, name } => write!(f, "applying #{ordinal} {name}"),
        }
    }
}

/// Lifecycle of a run.
///
/// `NotStarted → Connected → IdentityVerified → Applying(i) → Completed`, or
/// `Failed` from any non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Connected,
    IdentityVerified,
    Applying { ordinal: u32 },
    Completed,
    Failed { stage: RunStage, cause: String },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed { .. })
    }

    /// Whether moving from `self` to `next` keeps the run single-pass.
    pub fn can_transition_to(&self, next: &RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Completed, _) | (Failed { .. }, _) => false,
            (_, Failed { .. }) => true,
            (NotStarted, Connected) => true,
            (Connected, IdentityVerified) => true,
            (IdentityVerified, Applying { .. }) | (IdentityVerified, Completed) => true,
            (Applying { ordinal: a }, Applying { ordinal: b }) => b > a,
            (Applying { .. }, Completed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::NotStarted => write!(f, "not started"),
            RunState::Connected => write!(f, "connected"),
            RunState::IdentityVerified => write!(f, "identity verified"),
            RunState::Applying { ordinal } => write!(f, "applying #{ordinal}"),
            RunState::Completed => write!(f, "completed"),
            RunState::Failed { stage, cause } => write!(f, "failed at {stage}: {cause}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let path = [
            RunState::NotStarted,
            RunState::Connected,
            RunState::IdentityVerified,
            RunState::Applying { ordinal: 1 },
            RunState::Applying { ordinal: 2 },
            RunState::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(&pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_no_reentry() {
        let failed = RunState::Failed {
            stage: RunStage::Connect,
            cause: "refused".to_string(),
        };
        assert!(RunState::NotStarted.can_transition_to(&failed));
        assert!(!failed.can_transition_to(&RunState::Connected));
        assert!(!RunState::Completed.can_transition_to(&RunState::NotStarted));
        assert!(!RunState::IdentityVerified.can_transition_to(&RunState::Connected));
        assert!(!RunState::Applying { ordinal: 2 }.can_transition_to(&RunState::Applying { ordinal: 2 }));
        assert!(!RunState::NotStarted.can_transition_to(&RunState::IdentityVerified));
    }

    #[test]
    fn test_state_serialization() {
        let state = RunState::Failed {
            stage: RunStage::Applying {
                ordinal: 2,
                name: "create_table_transaction".to_string(),
            },
            cause: "boom".to_string(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["stage"]["stage"], "applying");
        assert_eq!(json["stage"]["ordinal"], 2);
    }
}
