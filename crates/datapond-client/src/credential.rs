// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session credential extraction from login replies.
//!
//! Grammar, applied to the login payload text:
//!
//! ```text
//! payload    := <any> MARKER value <any>
//! MARKER     := 'n":"'             (tail of "session":")
//! value      := <chars up to and including the first '='>
//! credential := "session=" value
//! ```

use std::fmt;

use crate::error::{DatapondError, Result};

/// Marker that introduces the session field.
pub const SESSION_MARKER: &str = "n\":\"";
/// Last character of the session value.
pub const SESSION_DELIMITER: char = '=';
/// Prefix prepended to the extracted value.
pub const SESSION_TAG: &str = "session=";

/// Cookie attached to authenticated requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Parse the credential out of a login reply payload.
    pub fn parse(payload: &str) -> Result<Self> {
        let start = payload
            .find(SESSION_MARKER)
            .map(|pos| pos + SESSION_MARKER.len())
            .ok_or_else(|| DatapondError::MalformedPayload("session marker not found".into()))?;

        let rest = &payload[start..];
        let end = rest
            .find(SESSION_DELIMITER)
            .map(|pos| pos + SESSION_DELIMITER.len_utf8())
            .ok_or_else(|| {
                DatapondError::MalformedPayload("session value not terminated".into())
            })?;

        let value = &rest[..end];
        if value.len() == SESSION_DELIMITER.len_utf8() {
            return Err(DatapondError::MalformedPayload("empty session value".into()));
        }

        Ok(Self(format!("{}{}", SESSION_TAG, value)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
