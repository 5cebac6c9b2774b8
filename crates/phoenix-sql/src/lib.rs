//! Phoenix SQL - DDL parsing and typed schema definitions

pub mod command;
pub mod definition;
pub mod parser;

pub use command::SqlCommand;
pub use definition::{ColumnDef, QualifiedName, SchemaDef, TableDef};
pub use parser::SqlParser;
