// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reply dispatch: the token-correlation state machine.
//!
//! Slot life cycle:
//!
//! ```text
//!   Unallocated --begin--> InFlight --dispatch--> Matched  --> Unallocated
//!                                   --release---> Released --> Unallocated
//!   (reply with unknown token) ----------------> Dropped  (table untouched)
//! ```
//!
//! [`Dispatcher::dispatch`] and [`Dispatcher::release`] free the slot before
//! returning. The caller invokes the owning handler afterwards, so a handler
//! that starts a new transaction sees the slot as available.

use crate::credential::Credential;
use crate::envelope::Envelope;
use crate::error::{DatapondError, Result};
use crate::handlers::FailureReason;
use crate::table::PendingTable;
use crate::token::TokenAllocator;
use crate::types::{Token, TransactionKind};

/// What happened to one reply or release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Reply matched an in-flight transaction; its slot is free again.
    Delivered {
        token: Token,
        kind: TransactionKind,
        ok: bool,
    },
    /// Transaction dropped after a send failure or timeout.
    Released {
        token: Token,
        kind: TransactionKind,
        reason: FailureReason,
    },
    /// No in-flight transaction matches; the reply was discarded.
    Unroutable { token: Option<Token> },
}

/// Counters kept by the dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub started: u64,
    pub delivered: u64,
    pub unroutable: u64,
    pub send_failures: u64,
    pub timeouts: u64,
    /// Transactions refused for lack of a free slot or token.
    pub rejected: u64,
}

/// Owns the pending table, the token allocator, and the session credential.
#[derive(Debug)]
pub struct Dispatcher {
    table: PendingTable,
    tokens: TokenAllocator,
    session: Option<Credential>,
    last_payload: String,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(capacity: usize) -> Self {
        Self {
            table: PendingTable::new(capacity),
            tokens: TokenAllocator::new(),
            session: None,
            last_payload: String::new(),
            stats: DispatchStats::default(),
        }
    }

    /// Lease a token for a new transaction and record it as in flight.
    ///
    /// Fails with [`DatapondError::CapacityExceeded`] if the table is full,
    /// before any token is consumed, or if every token is still leased.
    pub fn begin(&mut self, kind: TransactionKind) -> Result<Token> {
        if self.table.is_full() {
            return Err(self.reject(kind));
        }

        let table = &self.table;
        let Some(token) = self.tokens.next_free(|t| table.is_leased(t)) else {
            return Err(self.reject(kind));
        };
        self.table.insert(token, kind)?;
        self.stats.started += 1;
        Ok(token)
    }

    fn reject(&mut self, kind: TransactionKind) -> DatapondError {
        self.stats.rejected += 1;
        log::warn!(
            "cannot start {} transaction: {} transactions in flight",
            kind,
            self.table.len()
        );
        DatapondError::CapacityExceeded {
            capacity: self.table.capacity(),
        }
    }

    /// Match a reply to its transaction and free the slot.
    ///
    /// A successful login reply also replaces the session credential; if the
    /// credential cannot be parsed the outcome reports `ok: false`.
    pub fn dispatch(&mut self, envelope: &Envelope) -> DispatchOutcome {
        self.last_payload.clone_from(&envelope.payload);

        let Some(token) = envelope.token else {
            return self.unroutable(None);
        };
        let Some(index) = self.table.find_by_token(token) else {
            return self.unroutable(Some(token));
        };

        self.table.set_status(token, envelope.code);
        let kind = match self.table.slot(index) {
            Some(slot) => slot.kind,
            None => return self.unroutable(Some(token)),
        };
        self.table.free(index);
        self.stats.delivered += 1;

        let mut ok = envelope.status_ok();
        if kind == TransactionKind::Login && ok {
            match Credential::parse(&envelope.payload) {
                Ok(credential) => {
                    log::info!("login accepted, session credential stored");
                    self.session = Some(credential);
                }
                Err(e) => {
                    log::warn!("login reply for token {} rejected: {}", token, e);
                    ok = false;
                }
            }
        }

        log::debug!(
            "reply {} for token {} ({}) -> ok={}",
            envelope.code,
            token,
            kind,
            ok
        );
        DispatchOutcome::Delivered { token, kind, ok }
    }

    /// Drop an in-flight transaction without a reply.
    ///
    /// Releasing a token that is not in flight is a no-op.
    pub fn release(&mut self, token: Option<Token>, reason: FailureReason) -> DispatchOutcome {
        let Some(token) = token else {
            return self.unroutable(None);
        };
        let Some(index) = self.table.find_by_token(token) else {
            return self.unroutable(Some(token));
        };
        let kind = match self.table.slot(index) {
            Some(slot) => slot.kind,
            None => return self.unroutable(Some(token)),
        };
        self.table.free(index);

        match reason {
            FailureReason::SendFailed => self.stats.send_failures += 1,
            FailureReason::TimedOut => self.stats.timeouts += 1,
        }
        log::warn!("{} transaction with token {} {}", kind, token, reason);
        DispatchOutcome::Released {
            token,
            kind,
            reason,
        }
    }

    /// Free the slot of a transaction that never left the client.
    pub(crate) fn abandon(&mut self, token: Token) {
        if let Some(index) = self.table.find_by_token(token) {
            self.table.free(index);
            self.stats.started = self.stats.started.saturating_sub(1);
        }
    }

    fn unroutable(&mut self, token: Option<Token>) -> DispatchOutcome {
        self.stats.unroutable += 1;
        match token {
            Some(t) => log::debug!("{}", DatapondError::UnroutableReply(t)),
            None => log::debug!("discarding reply without token"),
        }
        DispatchOutcome::Unroutable { token }
    }

    /// Current session credential, if a login has succeeded.
    pub fn session(&self) -> Option<&Credential> {
        self.session.as_ref()
    }

    /// Payload of the most recent reply.
    pub fn last_payload(&self) -> &str {
        &self.last_payload
    }

    pub fn table(&self) -> &PendingTable {
        &self.table
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}
