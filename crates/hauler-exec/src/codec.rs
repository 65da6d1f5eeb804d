//! Line-delimited JSON framing for the supervisor/worker protocol.
//!
//! One JSON document per `\n`-terminated line.
use serde::{Serialize, de::DeserializeOwned};

use crate::ExecError;

/// Encode `msg` as a single newline-terminated line.
pub fn encode_line<T: Serialize>(msg: &T) -> Result<String, ExecError> {
    let mut line = serde_json::to_string(msg).map_err(|e| ExecError::Protocol(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Decode one line. Blank lines yield `Ok(None)`.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<Option<T>, ExecError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|e| ExecError::Protocol(format!("{e}: {}", preview(line))))
}

fn preview(line: &str) -> &str {
    const MAX: usize = 120;
    match line.char_indices().nth(MAX) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}
