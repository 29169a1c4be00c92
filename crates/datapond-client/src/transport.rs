// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport abstraction for the Datapond client
//!
//! The client never touches a socket. It hands encoded requests to a
//! [`Transport`] and, on each poll, collects whatever the transport has to
//! report. Implementors own:
//! - the UDP socket (or radio link) and its RX/TX queues
//! - confirmable retransmission and duplicate detection
//! - the response-timeout clock
//!
//! ## Design Principles
//!
//! - **Non-blocking** - every method returns immediately
//! - **Raw bytes out** - events carry the packet as sent or received; the
//!   client decodes the token itself
//! - **Error handling** - Result-based, no panics

use crate::error::Result;

/// Outcome reported by [`Transport::advance`] or a received packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A packet arrived from the server.
    PacketAvailable(Vec<u8>),
    /// A queued message was acknowledged; the bytes are the piggy-backed reply.
    SendSucceeded(Vec<u8>),
    /// A queued message could not be delivered; the bytes are the request.
    SendFailed(Vec<u8>),
    /// No response arrived in time; the bytes are the request.
    ResponseTimedOut(Vec<u8>),
}

impl TransportEvent {
    /// Raw packet carried by the event.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::PacketAvailable(b)
            | Self::SendSucceeded(b)
            | Self::SendFailed(b)
            | Self::ResponseTimedOut(b) => b,
        }
    }
}

/// Transport trait for the request/response exchange with the server.
pub trait Transport {
    /// Queue an encoded request for sending.
    ///
    /// # Returns
    ///
    /// Index of the message in the send queue.
    fn enqueue_outbound(&mut self, packet: Vec<u8>) -> Result<usize>;

    /// Check for arrived data (non-blocking).
    fn poll_incoming(&mut self) -> Result<bool>;

    /// Take the next received packet, if any.
    fn receive(&mut self) -> Option<Vec<u8>>;

    /// Run one step of the send/retry state machine and report what finished.
    fn advance(&mut self) -> Vec<TransportEvent>;

    /// Drop everything in the RX and TX queues.
    fn clear_queues(&mut self) {}
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn enqueue_outbound(&mut self, packet: Vec<u8>) -> Result<usize> {
        (**self).enqueue_outbound(packet)
    }

    fn poll_incoming(&mut self) -> Result<bool> {
        (**self).poll_incoming()
    }

    fn receive(&mut self) -> Option<Vec<u8>> {
        (**self).receive()
    }

    fn advance(&mut self) -> Vec<TransportEvent> {
        (**self).advance()
    }

    fn clear_queues(&mut self) {
        (**self).clear_queues()
    }
}

/// Transport that accepts every request and never reports anything.
///
/// Useful for exercising the builders without a network.
#[derive(Debug, Default)]
pub struct NullTransport {
    queued: usize,
}

impl NullTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests accepted so far.
    pub fn queued(&self) -> usize {
        self.queued
    }
}

impl Transport for NullTransport {
    fn enqueue_outbound(&mut self, _packet: Vec<u8>) -> Result<usize> {
        let index = self.queued;
        self.queued += 1;
        Ok(index)
    }

    fn poll_incoming(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn receive(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn advance(&mut self) -> Vec<TransportEvent> {
        Vec::new()
    }
}
