// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Token-correlated CoAP client for the Datapond data-collection service.
//!
//! Embedded devices talk to Datapond over a connectionless transport where
//! replies arrive out of order, get lost, or time out. This crate tags every
//! request with a 1-byte token, remembers what each token is waiting for, and
//! routes each reply to the application handler that owns it, exactly once.
//!
//! # Architecture
//!
//! ```text
//! Application                 DatapondClient                      Transport
//!      |                            |                                  |
//!      |--- create_data_point ---->| token 0x07, slot 2               |
//!      |                            |--- encode --- enqueue_outbound ->|
//!      |--- poll ----------------->|<-- PacketAvailable(bytes) -------|
//!      |                            | extract -> find 0x07 -> free     |
//!      |<-- create_data_point(0x07, true)                              |
//! ```
//!
//! # Key Features
//!
//! - **Codec-agnostic**: packet framing lives behind [`EnvelopeCodec`]
//! - **Transport-agnostic**: any non-blocking queue implements [`Transport`]
//! - **Bounded**: a fixed table of pending transactions, full is an error
//! - **Session handling**: the login credential is captured and attached
//!   to every later request
//! - **Chained requests**: handlers receive an [`Issuer`] and may start the
//!   next transaction while the reply is being dispatched
//!
//! # Transactions
//!
//! | Operation | Request | Handler |
//! |-----------|---------|---------|
//! | [`login`](DatapondClient::login) | `POST user/login` | `login` |
//! | [`create_data_point`](DatapondClient::create_data_point) | `POST droplet` | `create_data_point` |
//! | [`last_data_point`](DatapondClient::last_data_point) | `GET droplet/last` | `read_data_point` |
//! | [`stats_today`](DatapondClient::stats_today) | `GET stream/stats/today/<id>` | `read_stream` |
//! | [`stats_range`](DatapondClient::stats_range) | `GET stream/stats/range/<id>` | `read_stream` |
//! | [`stream`](DatapondClient::stream) | `GET stream/<id>` | `read_stream` |

pub mod client;
pub mod config;
pub mod credential;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod table;
pub mod token;
pub mod transport;
pub mod types;

// Re-exports for convenience.
pub use client::DatapondClient;
pub use config::{ClientConfig, ConfigError};
pub use credential::Credential;
pub use dispatch::{DispatchOutcome, DispatchStats, Dispatcher};
pub use envelope::{
    extract, extract_token, Envelope, EnvelopeCodec, MessageType, Method, ReplyHeader, Request,
};
pub use error::{DatapondError, Result};
pub use handlers::{FailureReason, Handler, Handlers, Issuer};
pub use table::{PendingTable, Slot, SlotIndex};
pub use token::TokenAllocator;
pub use transport::{NullTransport, Transport, TransportEvent};
pub use types::{ResponseCode, StreamId, Token, TransactionKind};

#[cfg(test)]
mod tests;
