// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pending-transaction table.
//!
//! Fixed arena of slots sized once at construction. Free slots are kept on a
//! stack so insertion is O(1); lookup by token scans slots in index order and
//! returns the first in-use match.

use crate::error::{DatapondError, Result};
use crate::types::{ResponseCode, Token, TransactionKind};

/// Index of a slot inside the [`PendingTable`] arena.
pub type SlotIndex = usize;

/// Default number of transactions that may be outstanding at once.
pub const DEFAULT_CAPACITY: usize = 10;

/// One entry of the pending-transaction table.
///
/// Fields other than `in_use` keep their last values after the slot is
/// freed and are overwritten on the next insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub token: Token,
    pub kind: TransactionKind,
    /// Last response code seen for this slot (`ResponseCode::NONE` until a reply).
    pub status: ResponseCode,
    pub in_use: bool,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            token: Token::UNSET,
            kind: TransactionKind::Login,
            status: ResponseCode::NONE,
            in_use: false,
        }
    }
}

/// Fixed-capacity table of in-flight transactions.
#[derive(Debug)]
pub struct PendingTable {
    slots: Vec<Slot>,
    /// Indices of slots not in use. Popped from the back.
    free: Vec<SlotIndex>,
}

impl PendingTable {
    pub fn new(capacity: usize) -> Self {
        // Reverse so the lowest index is handed out first.
        let free = (0..capacity).rev().collect();
        Self {
            slots: vec![Slot::default(); capacity],
            free,
        }
    }

    /// Record a new in-flight transaction.
    pub fn insert(&mut self, token: Token, kind: TransactionKind) -> Result<SlotIndex> {
        let index = self.free.pop().ok_or(DatapondError::CapacityExceeded {
            capacity: self.slots.len(),
        })?;
        self.slots[index] = Slot {
            token,
            kind,
            status: ResponseCode::NONE,
            in_use: true,
        };
        log::debug!("slot {} <- token {} ({})", index, token, kind);
        Ok(index)
    }

    /// First in-use slot holding `token`, in slot order.
    pub fn find_by_token(&self, token: Token) -> Option<SlotIndex> {
        self.slots
            .iter()
            .position(|slot| slot.in_use && slot.token == token)
    }

    /// Mark a slot as no longer in use. Freeing an already free slot is a no-op.
    pub fn free(&mut self, index: SlotIndex) {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.in_use {
                slot.in_use = false;
                self.free.push(index);
                log::debug!("slot {} freed (token {})", index, slot.token);
            }
        }
    }

    /// Record the response code on the in-use slot holding `token`.
    pub fn set_status(&mut self, token: Token, status: ResponseCode) {
        if let Some(index) = self.find_by_token(token) {
            self.slots[index].status = status;
        }
    }

    pub fn slot(&self, index: SlotIndex) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// `true` if an in-use slot currently holds `token`.
    pub fn is_leased(&self, token: Token) -> bool {
        self.find_by_token(token).is_some()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of in-flight transactions.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    /// Iterate over in-use slots.
    pub fn in_flight(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|slot| slot.in_use)
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
