//! Ring: a cycle of orders settled atomically.
//!
//! A ring never owns its orders. It holds arena keys (see
//! [`crate::book::OrderArena`]), so an order shared by several rings is a
//! single arena slot referenced by index.
//!
//! ## Token chain
//!
//! For every position `i`, `order[i].token_b == order[(i + 1) % n].token_s`:
//! order `i` buys what order `i + 1` sells. Equivalently, order `i` sells to
//! its predecessor `i - 1`.

use std::collections::HashSet;

use crate::error::StructuralIssue;
use crate::types::Order;

/// Stable key of an order in the arena
pub type OrderKey = usize;

/// Ordered cyclic sequence of order references
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Ring {
    /// Arena keys in ring order
    pub orders: Vec<OrderKey>,
}

impl Ring {
    /// Create a ring from arena keys
    pub fn new(orders: Vec<OrderKey>) -> Self {
        Self { orders }
    }

    /// Number of orders in the ring
    #[inline]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether the ring is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Index of the order that buys from position `i`
    #[inline]
    pub fn prev(&self, i: usize) -> usize {
        (i + self.len() - 1) % self.len()
    }

    /// Index of the order that sells to position `i`
    #[inline]
    pub fn next(&self, i: usize) -> usize {
        (i + 1) % self.len()
    }

    /// Check ring shape and the token chain.
    ///
    /// `orders` must be the resolved orders in ring order.
    pub fn check_structure(&self, orders: &[&Order], max_size: usize) -> Result<(), StructuralIssue> {
        let n = self.len();
        if n < 2 {
            return Err(StructuralIssue::TooShort(n));
        }
        if n > max_size {
            return Err(StructuralIssue::TooLong { len: n, max: max_size });
        }

        let mut seen_keys = HashSet::with_capacity(n);
        for (i, key) in self.orders.iter().enumerate() {
            if !seen_keys.insert(*key) {
                return Err(StructuralIssue::DuplicateOrder { index: i });
            }
        }

        let mut seen_tokens = HashSet::with_capacity(n);
        for (i, order) in orders.iter().enumerate() {
            let next = self.next(i);
            if order.token_b != orders[next].token_s {
                return Err(StructuralIssue::TokenMismatch { index: i, next });
            }
            if !seen_tokens.insert(&order.token_s) {
                return Err(StructuralIssue::SubRing { index: i });
            }
        }
        Ok(())
    }
}

impl From<Vec<OrderKey>> for Ring {
    fn from(orders: Vec<OrderKey>) -> Self {
        Ring::new(orders)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
