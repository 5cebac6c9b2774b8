//! In-memory catalog service
//!
//! Interprets the schema and table DDL a bootstrap run issues. Used for
//! `--dry-run` and as the catalog service in tests, so it also counts sessions,
//! records every SQL text it receives and can be told to fail.

use crate::traits::{Connector, QueryRows, Session};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use phoenix_common::{ConnectionConfig, PhoenixError, Result, StatementErrorKind};
use phoenix_sql::{ColumnDef, QualifiedName, SqlCommand};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Table metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

/// In-memory catalog
struct InMemoryCatalog {
    schemas: DashMap<String, InMemorySchema>,
}

impl InMemoryCatalog {
    fn new() -> Self {
        Self {
            schemas: DashMap::new(),
        }
    }
}

/// In-memory schema
struct InMemorySchema {
    tables: DashMap<String, TableEntry>,
}

impl InMemorySchema {
    fn new() -> Self {
        Self {
            tables: DashMap::new(),
        }
    }
}

struct InjectedFailure {
    needle: String,
    kind: StatementErrorKind,
    message: String,
}

#[derive(Default)]
struct ServiceState {
    catalogs: DashMap<String, Arc<InMemoryCatalog>>,
    /// user -> credential; empty means any user is accepted
    users: DashMap<String, String>,
    failures: Mutex<Vec<InjectedFailure>>,
    executed: Mutex<Vec<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    unreachable: AtomicBool,
    anonymous: AtomicBool,
}

impl ServiceState {
    fn record(&self, sql: &str) {
        self.executed.lock().push(sql.to_string());
    }

    fn injected_failure(&self, sql: &str) -> Option<PhoenixError> {
        self.failures
            .lock()
            .iter()
            .find(|f| sql.contains(&f.needle))
            .map(|f| PhoenixError::statement(f.needle.clone(), f.kind, f.message.clone()))
    }

    fn catalog(&self, name: &str) -> Result<Arc<InMemoryCatalog>> {
        self.catalogs
            .get(name)
            .map(|c| c.value().clone())
            .ok_or_else(|| rejected(format!("Catalog '{name}' not found")))
    }
}

fn rejected(message: impl Into<String>) -> PhoenixError {
    PhoenixError::statement("", StatementErrorKind::Rejected, message)
}

/// Shared handle to an in-memory catalog service
#[derive(Clone, Default)]
pub struct InMemoryCatalogService {
    state: Arc<ServiceState>,
}

impl InMemoryCatalogService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service that already knows the given catalogs
    pub fn with_catalogs<I, S>(catalogs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let service = Self::new();
        for catalog in catalogs {
            service.add_catalog(catalog.as_ref());
        }
        service
    }

    pub fn add_catalog(&self, name: &str) {
        self.state
            .catalogs
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InMemoryCatalog::new()));
    }

    /// Require `user` to authenticate with `credential`
    pub fn add_user(&self, user: &str, credential: &str) {
        self.state
            .users
            .insert(user.to_string(), credential.to_string());
    }

    /// Fail any statement or query whose text contains `needle`
    pub fn fail_when(&self, needle: &str, kind: StatementErrorKind, message: &str) {
        self.state.failures.lock().push(InjectedFailure {
            needle: needle.to_string(),
            kind,
            message: message.to_string(),
        });
    }

    pub fn clear_failures(&self) {
        self.state.failures.lock().clear();
    }

    /// Refuse all connection attempts
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Make `SELECT current_user` return no rows
    pub fn set_anonymous(&self, anonymous: bool) {
        self.state.anonymous.store(anonymous, Ordering::SeqCst);
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Every SQL text received, in arrival order
    pub fn executed_sql(&self) -> Vec<String> {
        self.state.executed.lock().clone()
    }

    pub fn catalog_exists(&self, catalog: &str) -> bool {
        self.state.catalogs.contains_key(catalog)
    }

    pub fn schema_exists(&self, catalog: &str, schema: &str) -> bool {
        self.state
            .catalogs
            .get(catalog)
            .map(|c| c.schemas.contains_key(schema))
            .unwrap_or(false)
    }

    pub fn tables(&self, catalog: &str, schema: &str) -> Vec<String> {
        let Some(catalog) = self.state.catalogs.get(catalog) else {
            return vec![];
        };
        let mut tables: Vec<String> = catalog
            .schemas
            .get(schema)
            .map(|s| s.tables.iter().map(|t| t.key().clone()).collect())
            .unwrap_or_default();
        tables.sort();
        tables
    }

    pub fn table(&self, catalog: &str, schema: &str, table: &str) -> Option<TableEntry> {
        let catalog = self.state.catalogs.get(catalog)?;
        let schema = catalog.schemas.get(schema)?;
        let entry = schema.tables.get(table)?.value().clone();
        Some(entry)
    }
}

#[async_trait]
impl Connector for InMemoryCatalogService {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Session>> {
        let state = &self.state;
        if state.unreachable.load(Ordering::SeqCst) {
            return Err(PhoenixError::Connection(format!(
                "{} is unreachable",
                config.endpoint()
            )));
        }
        if !state.users.is_empty() {
            let accepted = state
                .users
                .get(&config.user)
                .map(|c| *c.value() == config.credential)
                .unwrap_or(false);
            if !accepted {
                return Err(PhoenixError::Connection(format!(
                    "authentication failed for user '{}'",
                    config.user
                )));
            }
        }
        if !state.catalogs.contains_key(&config.catalog) {
            return Err(PhoenixError::Connection(format!(
                "catalog '{}' does not exist",
                config.catalog
            )));
        }

        state.opened.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Opened in-memory session for {}", config.dsn());
        Ok(Box::new(InMemorySession {
            state: self.state.clone(),
            catalog: config.catalog.clone(),
            principal: config.user.clone(),
        }))
    }
}

/// Session on an [`InMemoryCatalogService`]
struct InMemorySession {
    state: Arc<ServiceState>,
    catalog: String,
    principal: String,
}

impl InMemorySession {
    /// Split a schema name into (catalog, schema), defaulting the catalog
    fn schema_path(&self, name: &QualifiedName) -> Result<(String, String)> {
        match name.parts.as_slice() {
            [schema] => Ok((self.catalog.clone(), schema.clone())),
            [catalog, schema] => Ok((catalog.clone(), schema.clone())),
            _ => Err(rejected(format!("Invalid schema name '{name}'"))),
        }
    }

    fn create_schema(&self, name: &QualifiedName, if_not_exists: bool) -> Result<()> {
        let (catalog, schema) = self.schema_path(name)?;
        let catalog = self.state.catalog(&catalog)?;
        if catalog.schemas.contains_key(&schema) {
            if if_not_exists {
                return Ok(());
            }
            return Err(rejected(format!("Schema '{name}' already exists")));
        }
        catalog.schemas.insert(schema, InMemorySchema::new());
        Ok(())
    }

    fn create_table(
        &self,
        name: &QualifiedName,
        columns: &[ColumnDef],
        if_not_exists: bool,
    ) -> Result<()> {
        let schema_name = name
            .parent()
            .ok_or_else(|| rejected(format!("Table name '{name}' has no schema")))?;
        let (catalog, schema) = self.schema_path(&schema_name)?;
        let catalog = self.state.catalog(&catalog)?;
        let schema = catalog
            .schemas
            .get(&schema)
            .ok_or_else(|| rejected(format!("Schema '{schema_name}' not found")))?;

        let table = name.object().to_string();
        if schema.tables.contains_key(&table) {
            if if_not_exists {
                return Ok(());
            }
            return Err(rejected(format!("Table '{name}' already exists")));
        }
        schema.tables.insert(
            table.clone(),
            TableEntry {
                name: table,
                columns: columns.to_vec(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl Session for InMemorySession {
    async fn query(&mut self, sql: &str) -> Result<QueryRows> {
        self.state.record(sql);
        if let Some(err) = self.state.injected_failure(sql) {
            return Err(PhoenixError::Query(err.to_string()));
        }

        match SqlCommand::classify(sql)? {
            SqlCommand::CurrentUser => {
                if self.state.anonymous.load(Ordering::SeqCst) {
                    return Ok(QueryRows {
                        columns: vec!["_col0".to_string()],
                        rows: vec![],
                    });
                }
                Ok(QueryRows::single("_col0", self.principal.clone()))
            }
            SqlCommand::ShowCatalogs => {
                let mut catalogs: Vec<String> =
                    self.state.catalogs.iter().map(|c| c.key().clone()).collect();
                catalogs.sort();
                Ok(QueryRows {
                    columns: vec!["Catalog".to_string()],
                    rows: catalogs.into_iter().map(|c| vec![c.into()]).collect(),
                })
            }
            SqlCommand::Query => Ok(QueryRows::default()),
            _ => Err(PhoenixError::Query(format!("not a query: {sql}"))),
        }
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.state.record(sql);
        if let Some(err) = self.state.injected_failure(sql) {
            return Err(err);
        }

        match SqlCommand::classify(sql)? {
            SqlCommand::CreateSchema {
                name,
                if_not_exists,
            } => self.create_schema(&name, if_not_exists),
            SqlCommand::CreateTable {
                name,
                columns,
                if_not_exists,
            } => self.create_table(&name, &columns, if_not_exists),
            command if command.is_read_only() => Ok(()),
            _ => Err(rejected(format!("Statement not supported: {sql}"))),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig::default()
    }

    #[tokio::test]
    async fn test_connect_checks_catalog() {
        let service = InMemoryCatalogService::with_catalogs(["hive"]);
        let result = service.connect(&config()).await;
        assert!(matches!(result, Err(PhoenixError::Connection(_))));
        assert_eq!(service.sessions_opened(), 0);

        service.add_catalog("iceberg");
        let session = service.connect(&config()).await.unwrap();
        assert_eq!(service.sessions_opened(), 1);
        session.close().await.unwrap();
        assert_eq!(service.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn test_connect_authentication() {
        let service = InMemoryCatalogService::with_catalogs(["iceberg"]);
        service.add_user("admin", "pw");

        assert!(service.connect(&config()).await.is_err());

        let config = ConnectionConfig {
            credential: "pw".to_string(),
            ..config()
        };
        assert!(service.connect(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable() {
        let service = InMemoryCatalogService::with_catalogs(["iceberg"]);
        service.set_unreachable(true);
        assert!(matches!(
            service.connect(&config()).await,
            Err(PhoenixError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_queries() {
        let service = InMemoryCatalogService::with_catalogs(["iceberg", "system"]);
        let mut session = service.connect(&config()).await.unwrap();

        let rows = session.query("SELECT current_user").await.unwrap();
        assert_eq!(rows.first_value(), Some(&serde_json::json!("admin")));

        let rows = session.query("SHOW CATALOGS").await.unwrap();
        assert_eq!(rows.first_column_strings(), vec!["iceberg", "system"]);

        service.set_anonymous(true);
        assert!(session.query("SELECT current_user").await.unwrap().is_empty());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_if_not_exists_is_idempotent() {
        let service = InMemoryCatalogService::with_catalogs(["iceberg"]);
        let mut session = service.connect(&config()).await.unwrap();

        session
            .execute("CREATE SCHEMA IF NOT EXISTS iceberg.phoenix")
            .await
            .unwrap();
        session
            .execute("CREATE TABLE IF NOT EXISTS iceberg.phoenix.event (id bigint, name varchar)")
            .await
            .unwrap();

        // Same statements again, with a different definition for the table
        session
            .execute("CREATE SCHEMA IF NOT EXISTS iceberg.phoenix")
            .await
            .unwrap();
        session
            .execute("CREATE TABLE IF NOT EXISTS iceberg.phoenix.event (id bigint)")
            .await
            .unwrap();

        let table = service.table("iceberg", "phoenix", "event").unwrap();
        assert_eq!(table.columns.len(), 2);
        assert_eq!(service.tables("iceberg", "phoenix"), vec!["event"]);
        assert_eq!(service.executed_sql().len(), 4);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_errors() {
        let service = InMemoryCatalogService::with_catalogs(["iceberg"]);
        let mut session = service.connect(&config()).await.unwrap();

        // Table before its schema
        let err = session
            .execute("CREATE TABLE IF NOT EXISTS iceberg.phoenix.event (id bigint)")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PhoenixError::Statement {
                kind: StatementErrorKind::Rejected,
                ..
            }
        ));

        session.execute("CREATE SCHEMA phoenix").await.unwrap();
        assert!(service.schema_exists("iceberg", "phoenix"));
        assert!(session.execute("CREATE SCHEMA phoenix").await.is_err());

        let err = session.execute("CREATE TABEL x").await.unwrap_err();
        assert!(matches!(err, PhoenixError::SqlParse(_)));
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let service = InMemoryCatalogService::with_catalogs(["iceberg"]);
        service.fail_when("phoenix", StatementErrorKind::Transport, "connection reset");
        let mut session = service.connect(&config()).await.unwrap();

        let err = session
            .execute("CREATE SCHEMA IF NOT EXISTS iceberg.phoenix")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(!service.schema_exists("iceberg", "phoenix"));

        service.clear_failures();
        session
            .execute("CREATE SCHEMA IF NOT EXISTS iceberg.phoenix")
            .await
            .unwrap();
        assert!(service.schema_exists("iceberg", "phoenix"));
        session.close().await.unwrap();
    }
}
