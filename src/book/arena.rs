//! Slab-backed order arena.
//!
//! ## Architecture
//!
//! - **Slab**: owns every order; the slab key is the [`OrderKey`] rings refer to
//! - **HashMap**: order hash to slab key, so an order submitted twice lands in
//!   one slot
//!
//! Rings hold keys, never references, so the cyclic order graph stays a flat
//! owned vector plus indices.
//!
//! ## Memory Model
//!
//! Per slab docs (https://docs.rs/slab/0.4.11):
//! - `Slab::with_capacity(n)` pre-allocates n slots
//! - Keys are reused after removal
//! - O(1) insert, remove, and lookup
//!
//! ## Example
//!
//! ```
//! use ring_settlement::book::OrderArena;
//! use ring_settlement::types::{Amount, Order};
//!
//! let mut arena = OrderArena::with_capacity(16);
//! let order = Order::new("alice", "A", "B", Amount::from(3u32), Amount::from(1u32));
//!
//! let key = arena.insert(order.clone());
//! assert_eq!(arena.insert(order), key); // same hash, same slot
//! assert_eq!(arena.len(), 1);
//! ```

use std::collections::HashMap;

use slab::Slab;

use crate::book::BatchState;
use crate::types::{Order, OrderHash, OrderKey};

/// Order plus its cached hash
#[derive(Debug, Clone)]
pub struct OrderSlot {
    /// The order
    pub order: Order,
    /// Cached order hash
    pub hash: OrderHash,
}

/// Arena of orders addressed by stable keys
#[derive(Debug, Default)]
pub struct OrderArena {
    /// Order storage
    slots: Slab<OrderSlot>,

    /// Order hash to slab key
    index: HashMap<OrderHash, OrderKey>,
}

impl OrderArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an arena with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Slab::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Number of orders held
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the arena holds no orders
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Insert an order and return its key.
    ///
    /// An order whose hash is already present is not stored twice; the
    /// existing key is returned.
    pub fn insert(&mut self, order: Order) -> OrderKey {
        let hash = order.hash();
        if let Some(&key) = self.index.get(&hash) {
            return key;
        }
        let key = self.slots.insert(OrderSlot { order, hash });
        self.index.insert(hash, key);
        key
    }

    /// Order by key
    #[inline]
    pub fn get(&self, key: OrderKey) -> Option<&Order> {
        self.slots.get(key).map(|slot| &slot.order)
    }

    /// Slot (order and hash) by key
    #[inline]
    pub fn slot(&self, key: OrderKey) -> Option<&OrderSlot> {
        self.slots.get(key)
    }

    /// Key of an order hash
    #[inline]
    pub fn key_of(&self, hash: &OrderHash) -> Option<OrderKey> {
        self.index.get(hash).copied()
    }

    /// Remove an order by key
    pub fn remove(&mut self, key: OrderKey) -> Option<Order> {
        let slot = self.slots.try_remove(key)?;
        self.index.remove(&slot.hash);
        Some(slot.order)
    }

    /// Iterate over `(key, slot)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (OrderKey, &OrderSlot)> {
        self.slots.iter()
    }

    /// Drop orders that can never fill again: fully filled according to
    /// `state`, or expired at `now`. Returns the removed orders.
    pub fn prune(&mut self, state: &BatchState, now: u64) -> Vec<Order> {
        let dead: Vec<OrderKey> = self
            .slots
            .iter()
            .filter(|(_, slot)| {
                let fill = state.fill_state(&slot.hash);
                let exhausted = if slot.order.buy_no_more_than_amount_b {
                    fill.filled_b >= slot.order.amount_b
                } else {
                    fill.filled_s >= slot.order.amount_s
                };
                let expired = slot.order.valid_until.is_some_and(|until| now > until);
                exhausted || expired
            })
            .map(|(key, _)| key)
            .collect();

        dead.into_iter().filter_map(|key| self.remove(key)).collect()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
