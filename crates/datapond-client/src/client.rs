// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datapond client: transaction builders and the poll loop.

use std::fmt::Display;

use serde_json::json;

use crate::config::ClientConfig;
use crate::credential::Credential;
use crate::dispatch::{DispatchOutcome, DispatchStats, Dispatcher};
use crate::envelope::{self, EnvelopeCodec, Method, Request};
use crate::error::Result;
use crate::handlers::{FailureReason, Handlers, Issuer};
use crate::table::PendingTable;
use crate::transport::{Transport, TransportEvent};
use crate::types::{StreamId, TransactionKind};

/// Client for the Datapond service.
///
/// Generic over the transport that moves packets and the codec that frames
/// them. All work happens in the caller's thread: transaction operations
/// queue a request and return, and [`poll`](Self::poll) delivers replies to
/// the registered [`Handlers`].
pub struct DatapondClient<T: Transport, C: EnvelopeCodec> {
    link: Link<T, C>,
    handlers: Handlers,
}

/// Everything a transaction touches. Kept apart from the handlers so a
/// handler can be given `&mut Link` while it runs.
struct Link<T, C> {
    config: ClientConfig,
    transport: T,
    codec: C,
    dispatcher: Dispatcher,
    message_id: u16,
    last_packet: Vec<u8>,
}

impl<T: Transport, C: EnvelopeCodec> DatapondClient<T, C> {
    pub fn new(config: ClientConfig, transport: T, codec: C, handlers: Handlers) -> Result<Self> {
        config.validate()?;
        log::debug!(
            "datapond client for {}:{} ({} pending slots)",
            config.server_addr,
            config.server_port,
            config.max_pending
        );
        Ok(Self {
            link: Link {
                message_id: config.initial_message_id,
                dispatcher: Dispatcher::new(config.max_pending),
                config,
                transport,
                codec,
                last_packet: Vec::new(),
            },
            handlers,
        })
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Authenticate with the configured account.
    ///
    /// On success the session credential is stored and attached to every
    /// later request.
    pub fn login(&mut self) -> Result<usize> {
        self.link.login()
    }

    /// Append a value to a stream.
    pub fn create_data_point(&mut self, stream: StreamId, value: impl Display) -> Result<usize> {
        self.link.create_data_point(stream, &value)
    }

    /// Read the most recent value of a stream.
    pub fn last_data_point(&mut self, stream: StreamId) -> Result<usize> {
        self.link.last_data_point(stream)
    }

    /// Read today's aggregate statistics of a stream.
    pub fn stats_today(&mut self, stream: StreamId) -> Result<usize> {
        self.link.stats_today(stream)
    }

    /// Read aggregate statistics of a stream between two server timestamps.
    pub fn stats_range(&mut self, stream: StreamId, from: &str, to: &str) -> Result<usize> {
        self.link.stats_range(stream, from, to)
    }

    /// Read a stream description.
    pub fn stream(&mut self, stream: StreamId) -> Result<usize> {
        self.link.stream(stream)
    }

    // -----------------------------------------------------------------------
    // Event handling
    // -----------------------------------------------------------------------

    /// Run one cycle: drain received packets, then advance the transport's
    /// send queue. Returns what happened to each packet.
    ///
    /// Never fails; undecodable packets are logged and skipped.
    pub fn poll(&mut self) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::new();

        match self.link.transport.poll_incoming() {
            Ok(true) => {
                while let Some(packet) = self.link.transport.receive() {
                    self.collect(TransportEvent::PacketAvailable(packet), &mut outcomes);
                }
            }
            Ok(false) => {}
            Err(e) => log::warn!("transport poll failed: {}", e),
        }

        for event in self.link.transport.advance() {
            self.collect(event, &mut outcomes);
        }
        outcomes
    }

    fn collect(&mut self, event: TransportEvent, outcomes: &mut Vec<DispatchOutcome>) {
        match self.handle_event(event) {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => log::warn!("dropping packet: {}", e),
        }
    }

    /// Feed one transport event to the dispatcher and run the owning handler.
    ///
    /// The slot is free before the handler runs; the handler may start new
    /// transactions through its [`Issuer`].
    pub fn handle_event(&mut self, event: TransportEvent) -> Result<DispatchOutcome> {
        log::trace!("transport event {:?}", event);
        match event {
            TransportEvent::PacketAvailable(packet) | TransportEvent::SendSucceeded(packet) => {
                let envelope = envelope::extract(&self.link.codec, &packet)?;
                let outcome = self.link.dispatcher.dispatch(&envelope);
                if let DispatchOutcome::Delivered { token, kind, ok } = outcome {
                    let handled =
                        self.handlers
                            .invoke(&mut self.link, kind, token, ok, &envelope.payload);
                    if !handled {
                        log::debug!("no {} handler registered for token {}", kind, token);
                    }
                }
                Ok(outcome)
            }
            TransportEvent::SendFailed(packet) => self.release(&packet, FailureReason::SendFailed),
            TransportEvent::ResponseTimedOut(packet) => {
                self.release(&packet, FailureReason::TimedOut)
            }
        }
    }

    fn release(&mut self, packet: &[u8], reason: FailureReason) -> Result<DispatchOutcome> {
        let token = envelope::extract_token(&self.link.codec, packet)?;
        let outcome = self.link.dispatcher.release(token, reason);
        if let DispatchOutcome::Released {
            token,
            kind,
            reason,
        } = outcome
        {
            self.handlers
                .invoke_failed(&mut self.link, token, kind, reason);
        }
        Ok(outcome)
    }

    /// Empty the transport's RX and TX queues.
    ///
    /// In-flight transactions stay in the table until a reply or a failure
    /// event arrives for them.
    pub fn clear_queues(&mut self) {
        self.link.transport.clear_queues();
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Payload text of the most recent reply.
    pub fn payload(&self) -> &str {
        self.link.dispatcher.last_payload()
    }

    /// Session credential from the last successful login.
    pub fn credential(&self) -> Option<&Credential> {
        self.link.dispatcher.session()
    }

    /// Bytes of the most recently encoded request.
    pub fn last_packet(&self) -> &[u8] {
        &self.link.last_packet
    }

    /// Message id the next request will carry.
    pub fn message_id(&self) -> u16 {
        self.link.message_id
    }

    pub fn pending(&self) -> &PendingTable {
        self.link.dispatcher.table()
    }

    pub fn stats(&self) -> DispatchStats {
        self.link.dispatcher.stats()
    }

    /// Configuration the client was built with.
    ///
    /// Transport implementations read `server_addr`, `server_port` and
    /// `local_port` from here when binding and addressing their socket.
    pub fn config(&self) -> &ClientConfig {
        &self.link.config
    }

    pub fn handlers_mut(&mut self) -> &mut Handlers {
        &mut self.handlers
    }

    pub fn transport(&self) -> &T {
        &self.link.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.link.transport
    }
}

impl<T: Transport, C: EnvelopeCodec> Link<T, C> {
    fn cookie(&self) -> Option<String> {
        self.dispatcher.session().map(ToString::to_string)
    }

    fn next_message_id(&mut self) -> u16 {
        let id = self.message_id;
        self.message_id = self.message_id.wrapping_add(1);
        id
    }

    /// Lease a token, frame the request, and queue it.
    ///
    /// If framing or queueing fails the slot is released again and nothing
    /// is reported to the handlers.
    fn send<F>(&mut self, kind: TransactionKind, method: Method, build: F) -> Result<usize>
    where
        F: FnOnce(Request) -> Request,
    {
        let token = self.dispatcher.begin(kind)?;
        let request = build(Request::new(method, self.next_message_id(), token));

        let packet = match self.codec.encode(&request) {
            Ok(packet) => packet,
            Err(e) => {
                self.dispatcher.abandon(token);
                return Err(e);
            }
        };
        self.last_packet.clone_from(&packet);

        match self.transport.enqueue_outbound(packet) {
            Ok(index) => {
                log::debug!(
                    "{} request mid={} token {} queued at {}",
                    kind,
                    request.message_id,
                    token,
                    index
                );
                Ok(index)
            }
            Err(e) => {
                log::warn!("failed to queue {} request: {}", kind, e);
                self.dispatcher.abandon(token);
                Err(e)
            }
        }
    }
}

impl<T: Transport, C: EnvelopeCodec> Issuer for Link<T, C> {
    fn login(&mut self) -> Result<usize> {
        let body = json!({
            "email": self.config.username,
            "password": self.config.password,
        })
        .to_string();
        self.send(TransactionKind::Login, Method::Post, |req| {
            req.path("user").path("login").payload(body)
        })
    }

    fn create_data_point(&mut self, stream: StreamId, value: &dyn Display) -> Result<usize> {
        let cookie = self.cookie();
        self.send(TransactionKind::CreateDataPoint, Method::Post, |req| {
            with_cookie(
                req.path("droplet")
                    .query(format!("stream={}", stream))
                    .query(format!("value={}", value)),
                cookie,
            )
        })
    }

    fn last_data_point(&mut self, stream: StreamId) -> Result<usize> {
        let cookie = self.cookie();
        self.send(TransactionKind::ReadDataPoint, Method::Get, |req| {
            with_cookie(
                req.path("droplet")
                    .path("last")
                    .query(format!("stream={}", stream)),
                cookie,
            )
        })
    }

    fn stats_today(&mut self, stream: StreamId) -> Result<usize> {
        let cookie = self.cookie();
        self.send(TransactionKind::ReadStream, Method::Get, |req| {
            with_cookie(
                req.path("stream")
                    .path("stats")
                    .path("today")
                    .path(stream.to_string()),
                cookie,
            )
        })
    }

    fn stats_range(&mut self, stream: StreamId, from: &str, to: &str) -> Result<usize> {
        let cookie = self.cookie();
        self.send(TransactionKind::ReadStream, Method::Get, |req| {
            with_cookie(
                req.path("stream")
                    .path("stats")
                    .path("range")
                    .path(stream.to_string())
                    .query(format!("from={}", from))
                    .query(format!("to={}", to)),
                cookie,
            )
        })
    }

    fn stream(&mut self, stream: StreamId) -> Result<usize> {
        let cookie = self.cookie();
        self.send(TransactionKind::ReadStream, Method::Get, |req| {
            with_cookie(req.path("stream").path(stream.to_string()), cookie)
        })
    }

    fn credential(&self) -> Option<&Credential> {
        self.dispatcher.session()
    }

    fn pending(&self) -> &PendingTable {
        self.dispatcher.table()
    }
}

fn with_cookie(request: Request, cookie: Option<String>) -> Request {
    match cookie {
        Some(cookie) => request.query(cookie),
        None => request,
    }
}

impl<T: Transport, C: EnvelopeCodec> std::fmt::Debug for DatapondClient<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatapondClient")
            .field("server_addr", &self.link.config.server_addr)
            .field("server_port", &self.link.config.server_port)
            .field("message_id", &self.link.message_id)
            .field("dispatcher", &self.link.dispatcher)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}
