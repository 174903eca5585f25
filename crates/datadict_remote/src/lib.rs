//! Treasure Data REST API Client
//!
//! Thin HTTP wrapper over the TD catalog endpoints used by the write-back
//! workflow: read a table's current schema, replace it with an updated one,
//! and probe the API key before a batch run.
//!
//! Transient failures (429, 500, 503) are retried with exponential backoff:
//! 3 attempts, 300ms base delay. Everything else surfaces immediately as a
//! typed [`RemoteError`].
//!
//! The update endpoint REPLACES the whole schema rather than merging, so
//! callers must always send every column of the table.

use async_trait::async_trait;
use datadict_schema::{ColumnQuad, ColumnTriple};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

mod config;

pub use config::TdConfig;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(300);

/// Errors from the TD API. [`RemoteError::is_retryable`] marks the transient
/// subset the client retries automatically.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(
        "TD_API_KEY environment variable not set.\n\
         Generate an API key at: https://console.treasuredata.com/users/current\n\
         Then set it in your environment:\n  export TD_API_KEY=your-api-key-here"
    )]
    MissingApiKey,

    #[error(
        "TD API authentication failed. Check your TD_API_KEY.\n\
         Status: {status}\nDetails: {detail}"
    )]
    AuthFailed { status: u16, detail: String },

    #[error(
        "Table not found: {database}.{table}\n\
         Verify the database and table exist in Treasure Data."
    )]
    TableNotFound { database: String, table: String },

    #[error(
        "Invalid schema format for {database}.{table}\nDetails: {detail}\n\
         Schema must be an array of column entries."
    )]
    InvalidSchema {
        database: String,
        table: String,
        detail: String,
    },

    #[error("TD API request failed\nStatus: {status}\nDetails: {detail}")]
    Status { status: u16, detail: String },

    #[error("TD API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected TD API response: {0}")]
    BadResponse(String),
}

impl RemoteError {
    /// True for transient statuses worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self.status_code(), Some(429 | 500 | 503))
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            RemoteError::AuthFailed { status, .. } | RemoteError::Status { status, .. } => {
                Some(*status)
            }
            RemoteError::TableNotFound { .. } => Some(404),
            RemoteError::InvalidSchema { .. } => Some(400),
            RemoteError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Remote schema operations, kept behind a trait so the write-back
/// orchestration can run against a fake in tests.
#[async_trait]
pub trait SchemaApi: Send + Sync {
    /// Read the current schema of a table as (name, type, description) triples.
    async fn fetch_schema(
        &self,
        database: &str,
        table: &str,
    ) -> Result<Vec<ColumnTriple>, RemoteError>;

    /// Replace a table's schema. The payload must contain every column.
    async fn update_schema(
        &self,
        database: &str,
        table: &str,
        schema: &[ColumnQuad],
    ) -> Result<(), RemoteError>;
}

/// Response shape of `/v3/table/show`. Depending on table age the `schema`
/// field is either a JSON array or a JSON-encoded string of one.
#[derive(Debug, Deserialize)]
struct TableShowResponse {
    #[serde(default)]
    schema: Option<serde_json::Value>,
}

/// HTTP client for the Treasure Data REST API.
pub struct TdApiClient {
    config: TdConfig,
    http: reqwest::Client,
}

impl TdApiClient {
    pub fn new(config: TdConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Build a client from `TD_API_KEY` / `TD_API_ENDPOINT`.
    pub fn from_env() -> Result<Self, RemoteError> {
        Ok(Self::new(TdConfig::from_env()?))
    }

    pub fn endpoint(&self) -> &str {
        self.config.endpoint()
    }

    /// Probe the API before a batch run. A lightweight GET that fails fast on
    /// a missing, invalid, or expired key.
    pub async fn test_connection(&self) -> Result<(), RemoteError> {
        let url = format!("{}/v3/database/list", self.config.endpoint());
        let response = self.send_with_retry(|| self.authorized(self.http.get(&url))).await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(RemoteError::AuthFailed {
                status: status.as_u16(),
                detail:
                    "Your TD_API_KEY is invalid or expired.\nGenerate a new key at: https://console.treasuredata.com/users/current"
                        .to_string(),
            });
        }
        Err(RemoteError::Status {
            status: status.as_u16(),
            detail,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("TD1 {}", self.config.api_key()))
    }

    /// Issue a request, retrying transient statuses with exponential backoff.
    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response, RemoteError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            let result = build().send().await;
            let retryable = match &result {
                Ok(response) => matches!(response.status().as_u16(), 429 | 500 | 503),
                Err(err) => err.is_connect() || err.is_timeout(),
            };
            if !retryable || attempt >= RETRY_ATTEMPTS {
                return result.map_err(RemoteError::from);
            }

            let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
            attempt += 1;
            let status = result
                .as_ref()
                .map(|r| r.status().as_u16().to_string())
                .unwrap_or_else(|_| "network error".to_string());
            tracing::warn!(attempt, status = %status, delay_ms = delay.as_millis() as u64, "Retrying TD API request");
            tokio::time::sleep(delay).await;
        }
    }

    async fn error_from_response(
        database: &str,
        table: &str,
        response: reqwest::Response,
    ) -> RemoteError {
        let status = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        match status {
            401 | 403 => RemoteError::AuthFailed { status, detail },
            404 => RemoteError::TableNotFound {
                database: database.to_string(),
                table: table.to_string(),
            },
            400 => RemoteError::InvalidSchema {
                database: database.to_string(),
                table: table.to_string(),
                detail,
            },
            _ => RemoteError::Status { status, detail },
        }
    }
}

#[async_trait]
impl SchemaApi for TdApiClient {
    async fn fetch_schema(
        &self,
        database: &str,
        table: &str,
    ) -> Result<Vec<ColumnTriple>, RemoteError> {
        let url = format!(
            "{}/v3/table/show/{}/{}",
            self.config.endpoint(),
            database,
            table
        );
        tracing::debug!(database, table, "Fetching table schema");

        let response = self.send_with_retry(|| self.authorized(self.http.get(&url))).await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(database, table, response).await);
        }

        let body: TableShowResponse = response.json().await?;
        let Some(schema) = body.schema else {
            return Ok(Vec::new());
        };
        // Older tables return the schema array JSON-encoded inside a string.
        let schema = match schema {
            serde_json::Value::String(raw) => {
                if raw.trim().is_empty() {
                    return Ok(Vec::new());
                }
                serde_json::from_str(&raw)
                    .map_err(|err| RemoteError::BadResponse(format!("schema field: {err}")))?
            }
            other => other,
        };
        parse_schema_entries(&schema)
    }

    async fn update_schema(
        &self,
        database: &str,
        table: &str,
        schema: &[ColumnQuad],
    ) -> Result<(), RemoteError> {
        let url = format!(
            "{}/v3/table/update-schema/{}/{}",
            self.config.endpoint(),
            database,
            table
        );
        let encoded = serde_json::to_string(schema)
            .map_err(|err| RemoteError::BadResponse(format!("schema payload: {err}")))?;
        tracing::debug!(database, table, columns = schema.len(), "Updating table schema");

        let response = self
            .send_with_retry(|| {
                self.authorized(self.http.post(&url))
                    .form(&[("schema", encoded.as_str())])
            })
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(database, table, response).await);
        }
        Ok(())
    }
}

/// Decode a `/v3/table/show` schema array into triples. Entries may carry
/// 2 fields (no description), 3 (name/type/description), or 4 (with alias).
fn parse_schema_entries(schema: &serde_json::Value) -> Result<Vec<ColumnTriple>, RemoteError> {
    let entries = schema
        .as_array()
        .ok_or_else(|| RemoteError::BadResponse("schema field is not an array".to_string()))?;

    let mut columns = Vec::with_capacity(entries.len());
    for entry in entries {
        let fields = entry
            .as_array()
            .ok_or_else(|| RemoteError::BadResponse("schema entry is not an array".to_string()))?;
        let field_str = |index: usize| -> String {
            fields
                .get(index)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let name = field_str(0);
        if name.is_empty() {
            return Err(RemoteError::BadResponse(
                "schema entry has no column name".to_string(),
            ));
        }
        let col_type = field_str(1);
        // 4-field entries are [name, type, alias, description].
        let description = if fields.len() >= 4 {
            field_str(3)
        } else {
            field_str(2)
        };
        columns.push(ColumnTriple(name, col_type, description));
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_schema_triples() {
        let schema = json!([
            ["customer_id", "string", "Unique customer identifier"],
            ["created_at", "long", ""]
        ]);
        let columns = parse_schema_entries(&schema).expect("parse");
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name(), "customer_id");
        assert_eq!(columns[0].description(), "Unique customer identifier");
        assert_eq!(columns[1].description(), "");
    }

    #[test]
    fn test_parse_schema_quads_and_pairs() {
        let schema = json!([
            ["email", "string", null, "Customer email address"],
            ["time", "long"]
        ]);
        let columns = parse_schema_entries(&schema).expect("parse");
        assert_eq!(columns[0].description(), "Customer email address");
        assert_eq!(columns[1].name(), "time");
        assert_eq!(columns[1].description(), "");
    }

    #[test]
    fn test_parse_schema_rejects_non_array() {
        let err = parse_schema_entries(&json!({"name": "x"})).expect_err("must fail");
        assert!(matches!(err, RemoteError::BadResponse(_)));
    }

    #[test]
    fn test_retryable_statuses() {
        let retryable = RemoteError::Status {
            status: 503,
            detail: String::new(),
        };
        assert!(retryable.is_retryable());

        let auth = RemoteError::AuthFailed {
            status: 401,
            detail: String::new(),
        };
        assert!(!auth.is_retryable());
        assert_eq!(auth.status_code(), Some(401));

        let not_found = RemoteError::TableNotFound {
            database: "prod_db".to_string(),
            table: "customers".to_string(),
        };
        assert!(!not_found.is_retryable());
        assert_eq!(not_found.status_code(), Some(404));
    }

    #[test]
    fn test_update_payload_shape() {
        let schema = vec![
            ColumnQuad(
                "customer_id".to_string(),
                "string".to_string(),
                None,
                "Unique customer identifier".to_string(),
            ),
        ];
        let encoded = serde_json::to_string(&schema).expect("encode");
        assert_eq!(
            encoded,
            r#"[["customer_id","string",null,"Unique customer identifier"]]"#
        );
    }
}
