//! Phoenix Catalog - Catalog service sessions and the in-memory catalog

pub mod in_memory;
pub mod traits;

pub use in_memory::{InMemoryCatalogService, TableEntry};
pub use traits::{Connector, QueryRows, Session};
