// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cyclic correlation-token allocator.

use crate::types::Token;

/// Hands out tokens `0x01..=0xFF` in order, wrapping back to `0x01`.
///
/// The allocator itself performs no uniqueness check; use
/// [`TokenAllocator::next_free`] to skip tokens that are still leased.
#[derive(Debug, Clone)]
pub struct TokenAllocator {
    current: u8,
}

impl TokenAllocator {
    pub fn new() -> Self {
        Self {
            current: Token::FIRST.as_u8(),
        }
    }

    /// Token that the next call to [`next_token`](Self::next_token) will return.
    pub fn peek(&self) -> Token {
        Token::new(self.current)
    }

    /// Return the current token and advance.
    pub fn next_token(&mut self) -> Token {
        let token = Token::new(self.current);
        self.current = if self.current == Token::LAST.as_u8() {
            Token::FIRST.as_u8()
        } else {
            self.current + 1
        };
        token
    }

    /// Return the next token for which `is_leased` is false.
    ///
    /// Returns `None` only if every token in the space is leased.
    pub fn next_free<F>(&mut self, mut is_leased: F) -> Option<Token>
    where
        F: FnMut(Token) -> bool,
    {
        for _ in 0..Token::LAST.as_u8() {
            let token = self.next_token();
            if !is_leased(token) {
                return Some(token);
            }
            log::debug!("token {} still leased, skipping", token);
        }
        None
    }
}

impl Default for TokenAllocator {
    fn default() -> Self {
        Self::new()
    }
}
