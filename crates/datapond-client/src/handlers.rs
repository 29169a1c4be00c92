// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Application handlers invoked when a transaction completes.
//!
//! Each transaction kind owns one [`Handler`] slot. A slot left
//! [`Handler::Absent`] silently drops events for that kind.
//!
//! Every handler receives an [`Issuer`] as its first argument. The slot of
//! the completed transaction is already free when the handler runs, so a
//! handler can start a follow-up transaction right away.

use std::fmt::{self, Display};

use crate::credential::Credential;
use crate::error::Result;
use crate::table::PendingTable;
use crate::types::{StreamId, Token, TransactionKind};

/// Transaction operations available from inside a handler.
///
/// Implemented by the client; each call leases a token and queues a request
/// exactly as the matching `DatapondClient` method does.
pub trait Issuer {
    fn login(&mut self) -> Result<usize>;

    fn create_data_point(&mut self, stream: StreamId, value: &dyn Display) -> Result<usize>;

    fn last_data_point(&mut self, stream: StreamId) -> Result<usize>;

    fn stats_today(&mut self, stream: StreamId) -> Result<usize>;

    fn stats_range(&mut self, stream: StreamId, from: &str, to: &str) -> Result<usize>;

    fn stream(&mut self, stream: StreamId) -> Result<usize>;

    /// Session credential, already updated if this is a login reply.
    fn credential(&self) -> Option<&Credential>;

    /// In-flight transactions. The completed one is no longer listed.
    fn pending(&self) -> &PendingTable;
}

/// Login completed: `true` on success.
pub type LoginFn = Box<dyn FnMut(&mut dyn Issuer, bool)>;
/// Create completed: token of the request, success flag.
pub type CreateFn = Box<dyn FnMut(&mut dyn Issuer, Token, bool)>;
/// Read completed: token, success flag, payload text.
pub type ReadFn = Box<dyn FnMut(&mut dyn Issuer, Token, bool, &str)>;
/// Transaction released without a reply.
pub type FailureFn = Box<dyn FnMut(&mut dyn Issuer, Token, TransactionKind, FailureReason)>;

/// Why a transaction ended without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The transport could not deliver the request.
    SendFailed,
    /// No response arrived before the transport's deadline.
    TimedOut,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendFailed => f.write_str("send failed"),
            Self::TimedOut => f.write_str("timed out"),
        }
    }
}

/// A handler slot: either nothing, or a registered function.
pub enum Handler<F> {
    Absent,
    Registered(F),
}

impl<F> Default for Handler<F> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<F> Handler<F> {
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered(_))
    }

    /// Mutable access to the function, if registered.
    pub fn get_mut(&mut self) -> Option<&mut F> {
        match self {
            Self::Registered(f) => Some(f),
            Self::Absent => None,
        }
    }
}

impl<F> fmt::Debug for Handler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::Registered(_) => f.write_str("Registered"),
        }
    }
}

/// The full set of application handlers, injected at client construction.
///
/// ```
/// use datapond_client::Handlers;
///
/// let handlers = Handlers::new()
///     .on_login(|client, ok| {
///         if ok {
///             // First reading as soon as the session exists
///             let _ = client.last_data_point(4);
///         }
///     })
///     .on_read_data_point(|_, token, ok, payload| {
///         println!("{token}: {ok} {payload}");
///     });
/// assert!(handlers.login.is_registered());
/// ```
#[derive(Debug, Default)]
pub struct Handlers {
    pub login: Handler<LoginFn>,
    pub create_data_point: Handler<CreateFn>,
    pub read_data_point: Handler<ReadFn>,
    pub create_stream: Handler<CreateFn>,
    pub read_stream: Handler<ReadFn>,
    /// Optional hook for the send-failure and timeout paths. Kind-specific
    /// handlers are never called on those paths.
    pub failed: Handler<FailureFn>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_login(mut self, f: impl FnMut(&mut dyn Issuer, bool) + 'static) -> Self {
        self.login = Handler::Registered(Box::new(f));
        self
    }

    pub fn on_create_data_point(
        mut self,
        f: impl FnMut(&mut dyn Issuer, Token, bool) + 'static,
    ) -> Self {
        self.create_data_point = Handler::Registered(Box::new(f));
        self
    }

    pub fn on_read_data_point(
        mut self,
        f: impl FnMut(&mut dyn Issuer, Token, bool, &str) + 'static,
    ) -> Self {
        self.read_data_point = Handler::Registered(Box::new(f));
        self
    }

    pub fn on_create_stream(mut self, f: impl FnMut(&mut dyn Issuer, Token, bool) + 'static) -> Self {
        self.create_stream = Handler::Registered(Box::new(f));
        self
    }

    pub fn on_read_stream(
        mut self,
        f: impl FnMut(&mut dyn Issuer, Token, bool, &str) + 'static,
    ) -> Self {
        self.read_stream = Handler::Registered(Box::new(f));
        self
    }

    pub fn on_failure(
        mut self,
        f: impl FnMut(&mut dyn Issuer, Token, TransactionKind, FailureReason) + 'static,
    ) -> Self {
        self.failed = Handler::Registered(Box::new(f));
        self
    }

    /// Route a completed transaction to its handler.
    ///
    /// Returns `true` if a handler was registered for `kind`.
    pub fn invoke(
        &mut self,
        issuer: &mut dyn Issuer,
        kind: TransactionKind,
        token: Token,
        ok: bool,
        payload: &str,
    ) -> bool {
        match kind {
            TransactionKind::Login => self.login.get_mut().map(|f| f(issuer, ok)).is_some(),
            TransactionKind::CreateDataPoint => self
                .create_data_point
                .get_mut()
                .map(|f| f(issuer, token, ok))
                .is_some(),
            TransactionKind::ReadDataPoint => self
                .read_data_point
                .get_mut()
                .map(|f| f(issuer, token, ok, payload))
                .is_some(),
            TransactionKind::CreateStream => self
                .create_stream
                .get_mut()
                .map(|f| f(issuer, token, ok))
                .is_some(),
            TransactionKind::ReadStream => self
                .read_stream
                .get_mut()
                .map(|f| f(issuer, token, ok, payload))
                .is_some(),
        }
    }

    /// Report a transaction released without a reply.
    pub fn invoke_failed(
        &mut self,
        issuer: &mut dyn Issuer,
        token: Token,
        kind: TransactionKind,
        reason: FailureReason,
    ) -> bool {
        self.failed
            .get_mut()
            .map(|f| f(issuer, token, kind, reason))
            .is_some()
    }
}
