//! Identity check

use phoenix_catalog::Session;
use phoenix_common::{PhoenixError, Result};
use serde_json::Value;

/// Read-only probe returning the acting principal as one row, one column
pub const IDENTITY_PROBE: &str = "SELECT current_user";

/// Confirm the session can run queries and return the principal it acts as.
pub async fn verify_identity(session: &mut dyn Session) -> Result<String> {
    let rows = session
        .query(IDENTITY_PROBE)
        .await
        .map_err(|e| PhoenixError::Query(format!("identity probe failed: {e}")))?;

    let value = match rows.rows.as_slice() {
        [] => return Err(PhoenixError::Query("identity probe returned no rows".to_string())),
        [row] if row.len() == 1 => &row[0],
        [row] => {
            return Err(PhoenixError::Query(format!(
                "identity probe returned {} columns, expected 1",
                row.len()
            )))
        }
        many => {
            return Err(PhoenixError::Query(format!(
                "identity probe returned {} rows, expected 1",
                many.len()
            )))
        }
    };
    let principal = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    if principal.is_empty() {
        return Err(PhoenixError::Query(
            "identity probe returned an empty principal".to_string(),
        ));
    }
    Ok(principal)
}
