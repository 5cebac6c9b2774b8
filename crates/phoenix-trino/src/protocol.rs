//! Wire types of the Trino client REST protocol

use phoenix_common::{PhoenixError, StatementErrorKind};
use serde::Deserialize;
use serde_json::Value;

pub const HEADER_USER: &str = "X-Trino-User";
pub const HEADER_CATALOG: &str = "X-Trino-Catalog";
pub const HEADER_SOURCE: &str = "X-Trino-Source";
pub const HEADER_TRACE_TOKEN: &str = "X-Trino-Trace-Token";

/// `GET /v1/info`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub node_version: NodeVersion,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub coordinator: bool,
    #[serde(default)]
    pub starting: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeVersion {
    pub version: String,
}

/// One page of a statement's results
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResults {
    pub id: String,
    #[serde(default)]
    pub next_uri: Option<String>,
    #[serde(default)]
    pub columns: Option<Vec<Column>>,
    #[serde(default)]
    pub data: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    pub stats: Option<StatementStats>,
    #[serde(default)]
    pub error: Option<QueryError>,
    #[serde(default)]
    pub update_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatementStats {
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryError {
    pub message: String,
    #[serde(default)]
    pub error_code: i64,
    #[serde(default)]
    pub error_name: String,
    #[serde(default)]
    pub error_type: String,
}

impl QueryError {
    /// `USER_ERROR` covers syntax, missing objects and access denials, none of
    /// which go away by rerunning.
    pub fn kind(&self) -> StatementErrorKind {
        if self.error_type == "USER_ERROR" || self.error_name == "SYNTAX_ERROR" {
            StatementErrorKind::Rejected
        } else {
            StatementErrorKind::Failed
        }
    }

    pub fn into_error(self) -> PhoenixError {
        let kind = self.kind();
        PhoenixError::statement(
            "",
            kind,
            format!("{} ({})", self.message, self.error_name),
        )
    }
}

/// Status codes after which polling the same `nextUri` again is safe
pub fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 502..=504)
}
