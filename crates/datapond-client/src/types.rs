// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core value types: correlation tokens, transaction kinds, response codes.

use std::fmt;

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// One-byte correlation token echoed by the server in its reply.
///
/// Valid tokens are `0x01..=0xFF`; `0x00` is reserved as "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u8);

impl Token {
    /// Reserved "unset" value.
    pub const UNSET: Token = Token(0x00);
    /// First token handed out, and the value the allocator wraps back to.
    pub const FIRST: Token = Token(0x01);
    /// Last token before wraparound.
    pub const LAST: Token = Token(0xFF);

    /// Wrap a raw byte.
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Raw byte as it appears on the wire.
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// `true` for the reserved `0x00` value.
    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

/// Stream identifier on the server.
pub type StreamId = u32;

// ---------------------------------------------------------------------------
// Transaction kind
// ---------------------------------------------------------------------------

// Wire-level callback codes. The low nibble selects the resource
// (data point / stream / pond), the high nibble the operation.
pub const KIND_LOGIN: u8 = 0x01;
pub const KIND_CREATE_DATA_POINT: u8 = 0x10;
pub const KIND_READ_DATA_POINT: u8 = 0x20;
pub const KIND_UPDATE_DATA_POINT: u8 = 0x30;
pub const KIND_DELETE_DATA_POINT: u8 = 0x40;
pub const KIND_CREATE_STREAM: u8 = 0x11;
pub const KIND_READ_STREAM: u8 = 0x21;
pub const KIND_UPDATE_STREAM: u8 = 0x31;
pub const KIND_DELETE_STREAM: u8 = 0x41;

/// Which API call produced a pending slot, and therefore which handler and
/// extraction rule apply to its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransactionKind {
    Login = KIND_LOGIN,
    CreateDataPoint = KIND_CREATE_DATA_POINT,
    ReadDataPoint = KIND_READ_DATA_POINT,
    CreateStream = KIND_CREATE_STREAM,
    ReadStream = KIND_READ_STREAM,
}

impl TransactionKind {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a callback code. Update/delete codes are reserved and yield `None`.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            KIND_LOGIN => Some(Self::Login),
            KIND_CREATE_DATA_POINT => Some(Self::CreateDataPoint),
            KIND_READ_DATA_POINT => Some(Self::ReadDataPoint),
            KIND_CREATE_STREAM => Some(Self::CreateStream),
            KIND_READ_STREAM => Some(Self::ReadStream),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Login => "login",
            Self::CreateDataPoint => "create-data-point",
            Self::ReadDataPoint => "read-data-point",
            Self::CreateStream => "create-stream",
            Self::ReadStream => "read-stream",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Response code
// ---------------------------------------------------------------------------

/// Raw response code byte, `class.detail` packed as `ccc ddddd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResponseCode(u8);

impl ResponseCode {
    /// No response recorded yet.
    pub const NONE: ResponseCode = ResponseCode(0x00);
    /// 2.01 Created.
    pub const CREATED: ResponseCode = ResponseCode::new(2, 1);
    /// 2.05 Content.
    pub const CONTENT: ResponseCode = ResponseCode::new(2, 5);

    pub const fn new(class: u8, detail: u8) -> Self {
        Self(((class & 0x07) << 5) | (detail & 0x1F))
    }

    pub const fn from_u8(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }

    pub const fn class(self) -> u8 {
        self.0 >> 5
    }

    pub const fn detail(self) -> u8 {
        self.0 & 0x1F
    }

    /// Only "created" and "content retrieved" count as success.
    pub fn is_success(self) -> bool {
        self == Self::CREATED || self == Self::CONTENT
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class(), self.detail())
    }
}
