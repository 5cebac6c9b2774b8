//! Phoenix Common - Shared types, errors, and configuration

pub mod config;
pub mod error;
pub mod types;

pub use config::{ConnectionConfig, Scheme};
pub use error::{PhoenixError, Result, StatementErrorKind};
pub use types::{ApplyResult, RunId, RunStage, RunState, Statement};
