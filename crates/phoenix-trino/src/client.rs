//! HTTP client for the Trino coordinator

use crate::protocol::{
    is_retryable_status, QueryResults, ServerInfo, HEADER_CATALOG, HEADER_SOURCE,
    HEADER_TRACE_TOKEN, HEADER_USER,
};
use phoenix_common::{ConnectionConfig, PhoenixError, Result, StatementErrorKind};
use std::time::Duration;
use tracing::{debug, warn};

const MAX_POLL_RETRIES: u32 = 3;

/// Thin wrapper over `reqwest::Client` that speaks the statement protocol
#[derive(Clone)]
pub struct TrinoClient {
    http: reqwest::Client,
    config: ConnectionConfig,
    trace_token: String,
}

impl TrinoClient {
    /// `trace_token` is sent as `X-Trino-Trace-Token` on every request
    pub fn new(
        config: ConnectionConfig,
        timeout: Duration,
        trace_token: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| PhoenixError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            trace_token: trace_token.into(),
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn trace_token(&self) -> &str {
        &self.trace_token
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint(), path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header(HEADER_USER, &self.config.user)
            .header(HEADER_SOURCE, &self.config.source)
            .header(HEADER_TRACE_TOKEN, &self.trace_token);
        if self.config.has_credential() {
            request.basic_auth(&self.config.user, Some(&self.config.credential))
        } else {
            request
        }
    }

    /// `GET /v1/info`, the coordinator's liveness endpoint
    pub async fn server_info(&self) -> Result<ServerInfo> {
        let url = self.url("/v1/info");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PhoenixError::Connection(format!("{url} unreachable: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PhoenixError::Connection(format!(
                "{url} returned HTTP {status}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| PhoenixError::Connection(format!("Malformed server info: {e}")))
    }

    /// Submit a statement and return its first page
    pub async fn submit(&self, sql: &str) -> Result<QueryResults> {
        let url = self.url("/v1/statement");
        debug!("POST {} ({} bytes)", url, sql.len());
        let request = self
            .authorize(self.http.post(&url))
            .header(HEADER_CATALOG, &self.config.catalog)
            .body(sql.to_string());
        let response = request
            .send()
            .await
            .map_err(|e| PhoenixError::Connection(format!("Failed to submit statement: {e}")))?;
        Self::decode(response).await
    }

    /// Fetch the page behind `next_uri`, re-polling on gateway errors
    pub async fn advance(&self, next_uri: &str) -> Result<QueryResults> {
        let mut attempt = 0;
        loop {
            let response = self
                .authorize(self.http.get(next_uri))
                .send()
                .await
                .map_err(|e| PhoenixError::Connection(format!("Failed to poll statement: {e}")))?;

            let status = response.status();
            if is_retryable_status(status) && attempt < MAX_POLL_RETRIES {
                attempt += 1;
                warn!(
                    "Coordinator returned HTTP {} (attempt {}/{}), polling again",
                    status,
                    attempt,
                    MAX_POLL_RETRIES + 1
                );
                tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                continue;
            }
            return Self::decode(response).await;
        }
    }

    /// Best-effort cancellation of a running statement
    pub async fn cancel(&self, next_uri: &str) -> Result<()> {
        self.authorize(self.http.delete(next_uri))
            .send()
            .await
            .map_err(|e| PhoenixError::Connection(format!("Failed to cancel statement: {e}")))?;
        Ok(())
    }

    async fn decode(response: reqwest::Response) -> Result<QueryResults> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PhoenixError::Connection(format!(
                "Authentication rejected (HTTP {status})"
            )));
        }
        if is_retryable_status(status) {
            return Err(PhoenixError::Connection(format!(
                "Coordinator unavailable (HTTP {status})"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PhoenixError::statement(
                "",
                StatementErrorKind::Failed,
                format!("HTTP {status}: {}", body.trim()),
            ));
        }
        response.json().await.map_err(|e| {
            PhoenixError::statement(
                "",
                StatementErrorKind::Transport,
                format!("Malformed statement response: {e}"),
            )
        })
    }
}
