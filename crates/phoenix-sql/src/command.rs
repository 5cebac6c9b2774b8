//! Classification of the SQL a bootstrap run sends

use crate::definition::{ColumnDef, QualifiedName};
use crate::parser::SqlParser;
use phoenix_common::{PhoenixError, Result};
use sqlparser::ast::{self, SchemaName};

/// What a piece of SQL does, as far as catalog bootstrap is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlCommand {
    CreateSchema {
        name: QualifiedName,
        if_not_exists: bool,
    },
    CreateTable {
        name: QualifiedName,
        columns: Vec<ColumnDef>,
        if_not_exists: bool,
    },
    /// `SELECT current_user`
    CurrentUser,
    /// `SHOW CATALOGS`
    ShowCatalogs,
    /// Any other read-only query
    Query,
    /// Anything else the parser accepts
    Other(String),
}

fn normalize(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(';')
        .trim()
        .to_ascii_uppercase()
}

fn object_name(name: &ast::ObjectName) -> QualifiedName {
    QualifiedName::new(name.0.iter().map(|ident| ident.value.clone()))
}

impl SqlCommand {
    pub fn classify(sql: &str) -> Result<Self> {
        // Probe queries the generic dialect has no dedicated syntax for
        match normalize(sql).as_str() {
            "SELECT CURRENT_USER" => return Ok(SqlCommand::CurrentUser),
            "SHOW CATALOGS" => return Ok(SqlCommand::ShowCatalogs),
            _ => {}
        }

        let statement = SqlParser::parse_statement(sql)?;
        let command = match statement {
            ast::Statement::CreateSchema {
                schema_name,
                if_not_exists,
                ..
            } => match schema_name {
                SchemaName::Simple(name) => SqlCommand::CreateSchema {
                    name: object_name(&name),
                    if_not_exists,
                },
                other => {
                    return Err(PhoenixError::SqlParse(format!(
                        "unsupported schema name '{other}'"
                    )))
                }
            },
            ast::Statement::CreateTable(create) => SqlCommand::CreateTable {
                name: object_name(&create.name),
                columns: create
                    .columns
                    .iter()
                    .map(|c| ColumnDef::new(c.name.value.clone(), c.data_type.to_string()))
                    .collect(),
                if_not_exists: create.if_not_exists,
            },
            ast::Statement::Query(_) => SqlCommand::Query,
            other => SqlCommand::Other(other.to_string()),
        };
        Ok(command)
    }

    /// True for `CREATE ... IF NOT EXISTS`
    pub fn is_create_if_absent(&self) -> bool {
        matches!(
            self,
            SqlCommand::CreateSchema {
                if_not_exists: true,
                ..
            } | SqlCommand::CreateTable {
                if_not_exists: true,
                ..
            }
        )
    }

    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            SqlCommand::CurrentUser | SqlCommand::ShowCatalogs | SqlCommand::Query
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_probes() {
        assert_eq!(SqlCommand::classify("SELECT current_user").unwrap(), SqlCommand::CurrentUser);
        assert_eq!(SqlCommand::classify("  select   CURRENT_USER ;").unwrap(), SqlCommand::CurrentUser);
        assert_eq!(SqlCommand::classify("show catalogs").unwrap(), SqlCommand::ShowCatalogs);
        assert!(SqlCommand::classify("SELECT 1").unwrap().is_read_only());
    }

    #[test]
    fn test_classify_create_schema() {
        let command = SqlCommand::classify("CREATE SCHEMA IF NOT EXISTS iceberg.phoenix").unwrap();
        assert_eq!(
            command,
            SqlCommand::CreateSchema {
                name: QualifiedName::new(["iceberg", "phoenix"]),
                if_not_exists: true,
            }
        );
        assert!(command.is_create_if_absent());

        let command = SqlCommand::classify("CREATE SCHEMA iceberg.phoenix").unwrap();
        assert!(!command.is_create_if_absent());
    }

    #[test]
    fn test_classify_create_table() {
        let sql = "CREATE TABLE IF NOT EXISTS iceberg.phoenix.transaction (
            signature varchar,
            timestamp timestamp,
            successful boolean,
            confirmation_status varchar,
            slot bigint,
            fee bigint,
            compute_units bigint
        )";
        match SqlCommand::classify(sql).unwrap() {
            SqlCommand::CreateTable {
                name,
                columns,
                if_not_exists,
            } => {
                assert_eq!(name.to_string(), "iceberg.phoenix.transaction");
                assert_eq!(columns.len(), 7);
                assert_eq!(columns[0], ColumnDef::new("signature", "varchar"));
                assert_eq!(columns[1].name, "timestamp");
                assert_eq!(columns[4], ColumnDef::new("slot", "bigint"));
                assert!(if_not_exists);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_classify_other_and_errors() {
        let command = SqlCommand::classify("DROP TABLE iceberg.phoenix.event").unwrap();
        assert!(matches!(command, SqlCommand::Other(_)));
        assert!(!command.is_create_if_absent());
        assert!(SqlCommand::classify("CREATE TABLE (").is_err());
    }
}
