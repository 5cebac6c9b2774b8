//! Phoenix Trino - Catalog sessions over the Trino HTTP statement protocol

pub mod client;
pub mod connector;
pub mod protocol;

pub use client::TrinoClient;
pub use connector::{TrinoConnector, TrinoSession};
pub use protocol::{QueryResults, ServerInfo};
