use serde::Deserialize;
use serde_json::Value;

use crate::bail;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::types::{ChangeEnvelope, Operation};

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    operation: String,
    table: String,
    #[serde(default)]
    payload: Value,
}

/// Decodes one change message into a [`ChangeEnvelope`].
///
/// Fails with [`ErrorKind::MessageDecodeFailed`] when the message is not JSON, lacks the
/// `operation` or `table` fields, or names an unsupported operation. The payload is not
/// inspected; a missing payload decodes as `null`.
pub fn decode_envelope(message: &str) -> SyncResult<ChangeEnvelope> {
    let raw: RawEnvelope = serde_json::from_str(message).map_err(|err| {
        SyncError::from((
            ErrorKind::MessageDecodeFailed,
            "change message is not a valid envelope",
            err.to_string(),
        ))
        .with_source(err)
    })?;

    let Some(operation) = Operation::from_name(&raw.operation) else {
        bail!(
            ErrorKind::MessageDecodeFailed,
            "change message has an unsupported operation",
            format!("operation `{}`", raw.operation)
        );
    };

    Ok(ChangeEnvelope {
        operation,
        table: raw.table,
        payload: raw.payload,
    })
}
