//! Catalog service traits

use async_trait::async_trait;
use phoenix_common::{ConnectionConfig, Result, RunId};
use serde_json::Value;

/// Rows returned by a query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryRows {
    pub fn single(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            columns: vec![column.into()],
            rows: vec![vec![value.into()]],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row
    pub fn first_value(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Values of the first column rendered as strings
    pub fn first_column_strings(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.first())
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

/// Opens sessions against a catalog service
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open an authenticated session. Makes a single attempt and runs no DDL.
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Session>>;

    /// Like [`Connector::connect`], tagging the session's requests with `run_id`
    /// where the service supports it
    async fn connect_for_run(
        &self,
        config: &ConnectionConfig,
        run_id: &RunId,
    ) -> Result<Box<dyn Session>> {
        let _ = run_id;
        self.connect(config).await
    }
}

/// An open, exclusively owned handle to the catalog service
#[async_trait]
pub trait Session: Send {
    /// Run a read-only query and collect all rows
    async fn query(&mut self, sql: &str) -> Result<QueryRows>;

    /// Run a statement, discarding any rows
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Release the session. Consumes it, so it can only happen once.
    async fn close(self: Box<Self>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_rows_accessors() {
        let rows = QueryRows::single("_col0", "admin");
        assert_eq!(rows.first_value(), Some(&json!("admin")));
        assert!(!rows.is_empty());

        let rows = QueryRows {
            columns: vec!["Catalog".to_string()],
            rows: vec![vec![json!("iceberg")], vec![json!("system")], vec![json!(42)]],
        };
        assert_eq!(rows.first_column_strings(), vec!["iceberg", "system", "42"]);
        assert!(QueryRows::default().first_value().is_none());
    }
}
