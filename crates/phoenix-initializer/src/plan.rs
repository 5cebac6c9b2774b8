//! Ordered statement plan

use phoenix_common::{PhoenixError, Result, Statement};
use phoenix_sql::{SqlCommand, SqlParser};
use serde::Deserialize;
use std::collections::HashSet;

/// Validated, ordered list of idempotent DDL statements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementPlan {
    statements: Vec<Statement>,
}

#[derive(Debug, Deserialize)]
struct PlanFile {
    #[serde(rename = "statement", default)]
    statements: Vec<PlanEntry>,
}

#[derive(Debug, Deserialize)]
struct PlanEntry {
    name: String,
    sql: String,
}

impl StatementPlan {
    /// Validate and wrap `statements`.
    ///
    /// Rejects empty plans, ordinals that are not strictly ascending, blank or
    /// duplicate names, and DDL that is not `CREATE ... IF NOT EXISTS`.
    pub fn new(statements: Vec<Statement>) -> Result<Self> {
        validate(&statements)?;
        Ok(Self { statements })
    }

    /// Build a plan from `(name, sql)` pairs, numbering them from 1
    pub fn from_named<I, N, S>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        let statements = items
            .into_iter()
            .enumerate()
            .map(|(i, (name, sql))| Statement::new(i as u32 + 1, name, sql))
            .collect();
        Self::new(statements)
    }

    /// Load `[[statement]]` tables (`name`, `sql`) from a TOML file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: PlanFile = toml::from_str(&content)?;
        Self::from_named(file.statements.into_iter().map(|e| (e.name, e.sql)))
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.statements.iter().map(|s| s.name.as_str()).collect()
    }
}

fn validate(statements: &[Statement]) -> Result<()> {
    if statements.is_empty() {
        return Err(PhoenixError::InvalidPlan("plan has no statements".to_string()));
    }

    let mut names = HashSet::new();
    let mut previous = 0;
    for statement in statements {
        if statement.ordinal <= previous {
            return Err(PhoenixError::InvalidPlan(format!(
                "ordinal {} of '{}' does not follow {}",
                statement.ordinal, statement.name, previous
            )));
        }
        previous = statement.ordinal;

        if statement.name.trim().is_empty() {
            return Err(PhoenixError::InvalidPlan(format!(
                "statement #{} has no name",
                statement.ordinal
            )));
        }
        if !names.insert(statement.name.as_str()) {
            return Err(PhoenixError::InvalidPlan(format!(
                "duplicate statement name '{}'",
                statement.name
            )));
        }
        check_create_if_absent(statement)?;
    }
    Ok(())
}

fn check_create_if_absent(statement: &Statement) -> Result<()> {
    let idempotent = match SqlCommand::classify(&statement.text) {
        Ok(command) => command.is_create_if_absent(),
        // Connector-specific syntax the generic parser does not know
        Err(e) => {
            let single = SqlParser::is_single_statement(&statement.text)
                .map_err(|e| PhoenixError::InvalidPlan(format!("'{}': {}", statement.name, e)))?;
            if !single {
                return Err(PhoenixError::InvalidPlan(format!(
                    "'{}' holds more than one statement",
                    statement.name
                )));
            }
            let idempotent = has_create_if_absent_prefix(&statement.text);
            if idempotent {
                tracing::warn!("Cannot parse '{}', checked by prefix only: {}", statement.name, e);
            } else {
                return Err(PhoenixError::InvalidPlan(format!("'{}': {}", statement.name, e)));
            }
            idempotent
        }
    };
    if !idempotent {
        return Err(PhoenixError::InvalidPlan(format!(
            "'{}' is not a CREATE ... IF NOT EXISTS statement",
            statement.name
        )));
    }
    Ok(())
}

fn has_create_if_absent_prefix(sql: &str) -> bool {
    let words: Vec<String> = sql
        .split_whitespace()
        .take(5)
        .map(|w| w.to_ascii_uppercase())
        .collect();
    matches!(
        words.iter().map(String::as_str).collect::<Vec<_>>().as_slice(),
        ["CREATE", "SCHEMA" | "TABLE", "IF", "NOT", "EXISTS"]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_valid_plan() {
        let plan = StatementPlan::from_named([
            ("schema", "CREATE SCHEMA IF NOT EXISTS iceberg.phoenix"),
            ("event", "CREATE TABLE IF NOT EXISTS iceberg.phoenix.event (id bigint)"),
        ])
        .unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.statements()[1].ordinal, 2);
        assert_eq!(plan.names(), vec!["schema", "event"]);
    }

    #[test]
    fn test_rejects_non_idempotent() {
        let err = StatementPlan::from_named([("schema", "CREATE SCHEMA iceberg.phoenix")]).unwrap_err();
        assert!(matches!(err, PhoenixError::InvalidPlan(_)));

        let err = StatementPlan::from_named([("drop", "DROP TABLE iceberg.phoenix.event")]).unwrap_err();
        assert!(matches!(err, PhoenixError::InvalidPlan(_)));
    }

    #[test]
    fn test_rejects_bad_ordering_and_names() {
        let err = StatementPlan::new(vec![
            Statement::new(2, "a", "CREATE SCHEMA IF NOT EXISTS a.b"),
            Statement::new(1, "b", "CREATE SCHEMA IF NOT EXISTS a.c"),
        ])
        .unwrap_err();
        assert!(matches!(err, PhoenixError::InvalidPlan(_)));

        let err = StatementPlan::from_named([
            ("same", "CREATE SCHEMA IF NOT EXISTS a.b"),
            ("same", "CREATE SCHEMA IF NOT EXISTS a.c"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));

        assert!(StatementPlan::new(vec![]).is_err());
        assert!(StatementPlan::from_named([(" ", "CREATE SCHEMA IF NOT EXISTS a.b")]).is_err());
    }

    #[test]
    fn test_unparseable_but_idempotent_prefix() {
        let plan = StatementPlan::from_named([(
            "partitioned",
            "CREATE TABLE IF NOT EXISTS iceberg.phoenix.t (day date) WITH (partitioning = ARRAY['day'])",
        )]);
        assert!(plan.is_ok());
        assert!(StatementPlan::from_named([("junk", "CREATE TABEL x")]).is_err());
    }

    #[test]
    fn test_rejects_trailing_statements() {
        let err = StatementPlan::from_named([(
            "schema",
            "CREATE SCHEMA IF NOT EXISTS iceberg.phoenix; DROP TABLE iceberg.phoenix.event",
        )])
        .unwrap_err();
        assert!(matches!(err, PhoenixError::InvalidPlan(_)));
        assert!(err.to_string().contains("more than one statement"));

        let err = StatementPlan::from_named([(
            "t",
            "CREATE TABLE IF NOT EXISTS a.b.t (day date) WITH (x = 1); DROP SCHEMA a.b",
        )])
        .unwrap_err();
        assert!(matches!(err, PhoenixError::InvalidPlan(_)));

        assert!(StatementPlan::from_named([("schema", "CREATE SCHEMA IF NOT EXISTS a.b;")]).is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[[statement]]
name = "schema"
sql = "CREATE SCHEMA IF NOT EXISTS hive.audit"

[[statement]]
name = "log"
sql = "CREATE TABLE IF NOT EXISTS hive.audit.log (id bigint, message varchar)"
"#
        )
        .unwrap();

        let plan = StatementPlan::load_from_file(file.path()).unwrap();
        assert_eq!(plan.names(), vec!["schema", "log"]);
        assert_eq!(plan.statements()[0].ordinal, 1);
    }
}
