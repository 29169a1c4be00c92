// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the Datapond client.

use crate::config::ConfigError;
use crate::types::Token;
use thiserror::Error;

/// Result type for Datapond client operations.
pub type Result<T> = core::result::Result<T, DatapondError>;

/// Errors produced by the dispatch layer and its collaborators.
#[derive(Debug, Error)]
pub enum DatapondError {
    /// Every pending-transaction slot is in use; nothing was sent.
    #[error("pending-transaction table full ({capacity} slots in use)")]
    CapacityExceeded { capacity: usize },

    /// Reply token does not match any in-flight transaction.
    #[error("unroutable reply for token {0}")]
    UnroutableReply(Token),

    /// Login payload does not carry a usable session field.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The transport could not queue or deliver a message.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The transport gave up waiting for a response.
    #[error("response timed out")]
    ResponseTimeout,

    /// Envelope could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
