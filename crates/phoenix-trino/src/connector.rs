//! Connector and session over the Trino HTTP protocol

use crate::client::TrinoClient;
use crate::protocol::QueryResults;
use async_trait::async_trait;
use phoenix_catalog::{Connector, QueryRows, Session};
use phoenix_common::{ConnectionConfig, PhoenixError, Result, RunId};
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Opens [`TrinoSession`]s
#[derive(Debug, Clone)]
pub struct TrinoConnector {
    timeout: Duration,
}

impl TrinoConnector {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Per-request timeout for every HTTP call a session makes
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for TrinoConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for TrinoConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Session>> {
        self.open(config, RunId::new().to_string()).await
    }

    async fn connect_for_run(
        &self,
        config: &ConnectionConfig,
        run_id: &RunId,
    ) -> Result<Box<dyn Session>> {
        self.open(config, run_id.to_string()).await
    }
}

impl TrinoConnector {
    /// Checks the coordinator is up, the credentials are accepted and the
    /// target catalog is known. No plan statement is run.
    async fn open(
        &self,
        config: &ConnectionConfig,
        trace_token: String,
    ) -> Result<Box<dyn Session>> {
        let client = TrinoClient::new(config.clone(), self.timeout, trace_token)?;

        let info = client.server_info().await?;
        if info.starting {
            return Err(PhoenixError::Connection(format!(
                "Coordinator {} is still starting",
                config.endpoint()
            )));
        }
        info!(
            "Coordinator {} reachable (version {}, environment '{}')",
            config.endpoint(),
            info.node_version.version,
            info.environment
        );

        let mut session = TrinoSession {
            client,
            in_flight: None,
        };
        let catalogs = match session.query("SHOW CATALOGS").await {
            Ok(rows) => rows.first_column_strings(),
            Err(e) => {
                let _ = Box::new(session).close().await;
                return Err(match e {
                    PhoenixError::Connection(msg) => PhoenixError::Connection(msg),
                    other => PhoenixError::Connection(format!("Catalog probe failed: {other}")),
                });
            }
        };
        if !catalogs.iter().any(|c| c == &config.catalog) {
            let _ = Box::new(session).close().await;
            return Err(PhoenixError::Connection(format!(
                "Catalog '{}' does not exist (available: {})",
                config.catalog,
                catalogs.join(", ")
            )));
        }

        Ok(Box::new(session))
    }
}

/// Session on a Trino coordinator.
///
/// The protocol is stateless, so the session is the authenticated client plus
/// the `nextUri` of a statement that has not finished yet.
pub struct TrinoSession {
    client: TrinoClient,
    in_flight: Option<String>,
}

impl TrinoSession {
    pub fn trace_token(&self) -> &str {
        self.client.trace_token()
    }

    /// Submit `sql` and follow `nextUri` until the statement finishes
    async fn run(&mut self, sql: &str) -> Result<QueryRows> {
        let mut page = self.client.submit(sql).await?;
        let mut rows = QueryRows::default();
        debug!("Statement {} submitted", page.id);

        loop {
            let next = match Self::absorb(&mut rows, page) {
                Ok(next) => next,
                Err(e) => {
                    // An error page is terminal; there is nothing left to cancel.
                    self.in_flight = None;
                    return Err(e);
                }
            };
            match next {
                Some(uri) => {
                    self.in_flight = Some(uri.clone());
                    page = self.client.advance(&uri).await?;
                }
                None => {
                    self.in_flight = None;
                    return Ok(rows);
                }
            }
        }
    }

    /// Fold a page into `rows`, returning the next URI to poll
    fn absorb(rows: &mut QueryRows, page: QueryResults) -> Result<Option<String>> {
        if let Some(error) = page.error {
            return Err(error.into_error());
        }
        if rows.columns.is_empty() {
            if let Some(columns) = page.columns {
                rows.columns = columns.into_iter().map(|c| c.name).collect();
            }
        }
        if let Some(data) = page.data {
            rows.rows.extend(data);
        }
        Ok(page.next_uri)
    }
}

#[async_trait]
impl Session for TrinoSession {
    async fn query(&mut self, sql: &str) -> Result<QueryRows> {
        self.run(sql).await
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.run(sql).await.map(|_| ())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if let Some(uri) = &self.in_flight {
            warn!("Cancelling unfinished statement at {}", uri);
            self.client.cancel(uri).await?;
        }
        debug!("Closed session {}", self.client.trace_token());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(value: serde_json::Value) -> QueryResults {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_absorb_pages() {
        let mut rows = QueryRows::default();
        let next = TrinoSession::absorb(
            &mut rows,
            page(json!({"id": "q", "nextUri": "http://c/v1/statement/executing/q/x/1"})),
        )
        .unwrap();
        assert_eq!(next.as_deref(), Some("http://c/v1/statement/executing/q/x/1"));

        let next = TrinoSession::absorb(
            &mut rows,
            page(json!({
                "id": "q",
                "nextUri": "http://c/v1/statement/executing/q/x/2",
                "columns": [{"name": "Catalog", "type": "varchar"}],
                "data": [["iceberg"]]
            })),
        )
        .unwrap();
        assert!(next.is_some());

        let next = TrinoSession::absorb(
            &mut rows,
            page(json!({"id": "q", "columns": [{"name": "Catalog", "type": "varchar"}], "data": [["system"]]})),
        )
        .unwrap();
        assert!(next.is_none());
        assert_eq!(rows.columns, vec!["Catalog"]);
        assert_eq!(rows.first_column_strings(), vec!["iceberg", "system"]);
    }

    #[test]
    fn test_absorb_error() {
        let mut rows = QueryRows::default();
        let err = TrinoSession::absorb(
            &mut rows,
            page(json!({
                "id": "q",
                "error": {"message": "Schema 'phoenix' does not exist", "errorName": "SCHEMA_NOT_FOUND", "errorType": "USER_ERROR"}
            })),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PhoenixError::Statement {
                kind: phoenix_common::StatementErrorKind::Rejected,
                ..
            }
        ));
    }
}
