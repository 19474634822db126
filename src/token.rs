//! Page token codec
//!
//! Backends hand back their resumption point as a structured position
//! record (the last key of the page). Callers get it as URL-safe base64 of
//! its JSON form without padding, so it can travel in a query parameter and
//! come back later.
//! This module owns only the encoding; what a position means is up to the backend.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::{Result, TableError};
use crate::value::{Record, Value};

/// Upper bound on accepted token length
const MAX_TOKEN_LEN: usize = 16 * 1024;

/// Encode a backend position as a portable token
pub fn encode_page_token(position: Option<&Record>) -> Result<Option<String>> {
    let Some(position) = position else {
        return Ok(None);
    };
    let json = serde_json::to_vec(position)?;
    Ok(Some(URL_SAFE_NO_PAD.encode(json)))
}

/// Decode a portable token back into a backend position
pub fn decode_page_token(token: Option<&str>) -> Result<Option<Record>> {
    let Some(token) = token else {
        return Ok(None);
    };
    if token.is_empty() {
        return Err(TableError::InvalidPaginationToken("token is empty".to_string()));
    }
    if token.len() > MAX_TOKEN_LEN {
        return Err(TableError::InvalidPaginationToken(format!(
            "token exceeds {} characters",
            MAX_TOKEN_LEN
        )));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(token.as_bytes())
        .map_err(|e| TableError::InvalidPaginationToken(e.to_string()))?;
    let json: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| TableError::InvalidPaginationToken(e.to_string()))?;

    match Value::from_json(json) {
        Ok(Value::Map(position)) => Ok(Some(position)),
        Ok(other) => Err(TableError::InvalidPaginationToken(format!(
            "expected an object, got {}",
            other.kind()
        ))),
        Err(e) => Err(TableError::InvalidPaginationToken(e.to_string())),
    }
}
