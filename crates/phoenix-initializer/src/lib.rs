//! Phoenix Initializer - Connect, verify the principal, apply the bootstrap DDL

pub mod applier;
pub mod default_plan;
pub mod identity;
pub mod initializer;
pub mod plan;
pub mod reporter;

pub use applier::{ApplyFailure, ApplyOutcome, DdlApplier};
pub use default_plan::{phoenix_plan, PHOENIX_SCHEMA};
pub use identity::{verify_identity, IDENTITY_PROBE};
pub use initializer::{Initializer, RunReport};
pub use plan::StatementPlan;
pub use reporter::{CollectingReporter, ConsoleReporter, Reporter, RunEvent, TracingReporter};
