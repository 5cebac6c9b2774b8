//! The phoenix schema: transaction and event tables

use crate::plan::StatementPlan;
use phoenix_common::{PhoenixError, Result, Statement};
use phoenix_sql::{ColumnDef, SchemaDef, TableDef};

pub const PHOENIX_SCHEMA: &str = "phoenix";

/// Indexed on-chain transactions
pub fn transaction_table(schema: &SchemaDef) -> TableDef {
    schema.table(
        "transaction",
        vec![
            ColumnDef::new("signature", "varchar"),
            ColumnDef::new("timestamp", "timestamp"),
            ColumnDef::new("successful", "boolean"),
            ColumnDef::new("confirmation_status", "varchar"),
            ColumnDef::new("slot", "bigint"),
            ColumnDef::new("fee", "bigint"),
            ColumnDef::new("compute_units", "bigint"),
        ],
    )
}

pub fn event_table(schema: &SchemaDef) -> TableDef {
    schema.table(
        "event",
        vec![
            ColumnDef::new("id", "bigint"),
            ColumnDef::new("name", "varchar"),
        ],
    )
}

/// Schema `<catalog>.phoenix`, then its `transaction` and `event` tables
pub fn phoenix_plan(catalog: &str) -> Result<StatementPlan> {
    let valid = catalog
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && catalog.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(PhoenixError::InvalidPlan(format!(
            "'{catalog}' is not a plain catalog identifier"
        )));
    }

    let schema = SchemaDef::new(catalog, PHOENIX_SCHEMA);
    let tables = [transaction_table(&schema), event_table(&schema)];

    let mut statements = vec![Statement::new(
        1,
        schema.qualified_name().to_string(),
        schema.create_statement(),
    )];
    for table in &tables {
        statements.push(Statement::new(
            statements.len() as u32 + 1,
            table.qualified_name().to_string(),
            table.create_statement(),
        ));
    }
    StatementPlan::new(statements)
}
