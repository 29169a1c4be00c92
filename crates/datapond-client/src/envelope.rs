// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request descriptors, reply envelopes, and the codec boundary.
//!
//! Packet framing (header layout, option encoding, retransmission) belongs to
//! an [`EnvelopeCodec`] supplied by the integrator. This module only turns the
//! codec's view of a reply into an [`Envelope`] the dispatcher can route.

use crate::error::Result;
use crate::types::{ResponseCode, Token};

// ---------------------------------------------------------------------------
// Outbound request descriptor
// ---------------------------------------------------------------------------

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// Message reliability class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Confirmable: the transport retransmits until acknowledged or timed out.
    Confirmable,
    NonConfirmable,
}

/// Everything a codec needs to frame one outgoing transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub message_type: MessageType,
    pub method: Method,
    pub message_id: u16,
    pub token: Token,
    /// Uri-Path segments, in order.
    pub path: Vec<String>,
    /// Uri-Query elements, in order.
    pub query: Vec<String>,
    pub payload: Vec<u8>,
}

impl Request {
    pub fn new(method: Method, message_id: u16, token: Token) -> Self {
        Self {
            message_type: MessageType::Confirmable,
            method,
            message_id,
            token,
            path: Vec::new(),
            query: Vec::new(),
            payload: Vec::new(),
        }
    }

    /// Append a path segment.
    pub fn path(mut self, segment: impl Into<String>) -> Self {
        self.path.push(segment.into());
        self
    }

    /// Append a query element.
    pub fn query(mut self, element: impl Into<String>) -> Self {
        self.query.push(element.into());
        self
    }

    pub fn payload(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.payload = body.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Codec boundary
// ---------------------------------------------------------------------------

/// Header fields the dispatcher cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    /// `None` when the packet carries no token.
    pub token: Option<Token>,
    pub code: ResponseCode,
}

/// Packet codec provided by the transport layer.
pub trait EnvelopeCodec {
    /// Frame a request into wire bytes.
    fn encode(&self, request: &Request) -> Result<Vec<u8>>;

    /// Decode the token and response code of a packet.
    fn decode_header(&self, packet: &[u8]) -> Result<ReplyHeader>;

    /// Payload bytes following the header, if the packet has any.
    fn payload_of<'a>(&self, packet: &'a [u8]) -> Option<&'a [u8]>;
}

// ---------------------------------------------------------------------------
// Reply envelope
// ---------------------------------------------------------------------------

/// Decoded reply, scoped to a single dispatch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub token: Option<Token>,
    pub code: ResponseCode,
    pub payload: String,
}

impl Envelope {
    /// `true` iff the server answered "created" or "content retrieved".
    pub fn status_ok(&self) -> bool {
        self.code.is_success()
    }
}

/// Decode a raw reply into an [`Envelope`].
pub fn extract<C: EnvelopeCodec + ?Sized>(codec: &C, packet: &[u8]) -> Result<Envelope> {
    let header = codec.decode_header(packet)?;
    let payload = codec.payload_of(packet).map(payload_text).unwrap_or_default();
    Ok(Envelope {
        token: header.token,
        code: header.code,
        payload,
    })
}

/// Decode only the token, for the failure and timeout paths where the rest of
/// the buffer may be incomplete.
pub fn extract_token<C: EnvelopeCodec + ?Sized>(codec: &C, packet: &[u8]) -> Result<Option<Token>> {
    Ok(codec.decode_header(packet)?.token)
}

/// Payload text up to the first NUL byte. Invalid UTF-8 is replaced.
pub fn payload_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
