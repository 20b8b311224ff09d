//! Mutable order state threaded through the batch fold.
//!
//! ## Contents
//!
//! - Per-order fill state (`filled_s`, `filled_b`), keyed by [`OrderHash`].
//!   `filled_s` is the running total of tokenS the order has given up across
//!   every ring settled so far. It never decreases and never exceeds
//!   `amount_s`.
//! - Balance consumption per `(order, token)` and per `(account, token)`, so
//!   a balance bound reported by the oracle is not spent twice by two rings
//!   in the same batch.
//!
//! ## Determinism
//!
//! Everything is stored in `BTreeMap`s, so [`BatchState::state_root`] is a
//! pure function of the contents.

use std::collections::BTreeMap;

use num_traits::Zero;
use sha2::{Digest, Sha256};

use crate::types::{Address, Amount, OrderHash, RingSettlement, TokenId};

/// Filled amounts of one order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderFillState {
    /// tokenS given up so far (fees and margin included)
    pub filled_s: Amount,
    /// tokenB bought so far
    pub filled_b: Amount,
}

/// Order fill state and balance consumption for one namespace
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchState {
    fills: BTreeMap<OrderHash, OrderFillState>,
    order_spent: BTreeMap<(OrderHash, TokenId), Amount>,
    account_spent: BTreeMap<(Address, TokenId), Amount>,
}

impl BatchState {
    /// Empty state: nothing filled, nothing spent
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an order's fill state from earlier batches
    pub fn with_filled(mut self, hash: OrderHash, filled_s: Amount, filled_b: Amount) -> Self {
        self.fills.insert(hash, OrderFillState { filled_s, filled_b });
        self
    }

    // ========================================================================
    // Fill state
    // ========================================================================

    /// Fill state of an order (zero if never filled)
    pub fn fill_state(&self, hash: &OrderHash) -> OrderFillState {
        self.fills.get(hash).cloned().unwrap_or_default()
    }

    /// tokenS already given up by an order
    pub fn filled_s(&self, hash: &OrderHash) -> Amount {
        self.fills.get(hash).map(|f| f.filled_s.clone()).unwrap_or_default()
    }

    /// Add a ring's fill to an order
    pub fn record_fill(&mut self, hash: OrderHash, fill_s: &Amount, fill_b: &Amount) {
        let entry = self.fills.entry(hash).or_default();
        entry.filled_s += fill_s;
        entry.filled_b += fill_b;
    }

    /// Mark an order fully consumed (external cancellation)
    pub fn cancel(&mut self, hash: OrderHash, amount_s: &Amount) {
        let entry = self.fills.entry(hash).or_default();
        if entry.filled_s < *amount_s {
            entry.filled_s = amount_s.clone();
        }
    }

    /// Number of orders with recorded state
    pub fn tracked_orders(&self) -> usize {
        self.fills.len()
    }

    /// Iterate over recorded fill states in hash order
    pub fn iter(&self) -> impl Iterator<Item = (&OrderHash, &OrderFillState)> {
        self.fills.iter()
    }

    // ========================================================================
    // Balance consumption
    // ========================================================================

    /// Amount of `token` an order has spent so far
    pub fn spent_by_order(&self, hash: &OrderHash, token: &TokenId) -> Amount {
        self.order_spent
            .get(&(*hash, token.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// Amount of `token` an account has spent so far
    pub fn spent_by_account(&self, account: &Address, token: &TokenId) -> Amount {
        self.account_spent
            .get(&(account.clone(), token.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// Record that an order spent `amount` of `token`
    pub fn spend_by_order(&mut self, hash: OrderHash, token: TokenId, amount: &Amount) {
        if amount.is_zero() {
            return;
        }
        *self.order_spent.entry((hash, token)).or_default() += amount;
    }

    /// Record that an account spent `amount` of `token`
    pub fn spend_by_account(&mut self, account: Address, token: TokenId, amount: &Amount) {
        if amount.is_zero() {
            return;
        }
        *self.account_spent.entry((account, token)).or_default() += amount;
    }

    /// Apply a settled ring: fills and every balance it consumed.
    ///
    /// `miner` funds the ring's lrcReward payments.
    pub fn apply(&mut self, settlement: &RingSettlement, miner: &Address) {
        for order in &settlement.orders {
            self.record_fill(order.hash, &order.fill_s, &order.fill_b);
            self.spend_by_order(order.hash, order.token_s.clone(), &order.fill_s);
            self.spend_by_order(order.hash, order.fees.fee_token.clone(), &order.fees.fee_lrc);
            self.spend_by_account(miner.clone(), order.fees.fee_token.clone(), &order.fees.lrc_reward);
        }
    }

    // ========================================================================
    // Commitment
    // ========================================================================

    /// SHA-256 over `hash || len(filled_s) || filled_s || len(filled_b) || filled_b`
    /// for every order, in hash order
    pub fn state_root(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for (hash, fill) in &self.fills {
            hasher.update(hash.as_bytes());
            for amount in [&fill.filled_s, &fill.filled_b] {
                let bytes = amount.to_bytes_be();
                hasher.update((bytes.len() as u32).to_be_bytes());
                hasher.update(&bytes);
            }
        }
        hasher.finalize().into()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn h(b: u8) -> OrderHash {
        OrderHash([b; 32])
    }

    fn amt(v: u64) -> Amount {
        Amount::from(v)
    }

    #[test]
    fn test_unknown_order_is_unfilled() {
        let state = BatchState::new();
        assert_eq!(state.fill_state(&h(1)), OrderFillState::default());
        assert!(state.filled_s(&h(1)).is_zero());
    }

    #[test]
    fn test_record_fill_accumulates() {
        let mut state = BatchState::new();
        state.record_fill(h(1), &amt(60), &amt(6));
        state.record_fill(h(1), &amt(40), &amt(4));
        let fill = state.fill_state(&h(1));
        assert_eq!(fill.filled_s, amt(100));
        assert_eq!(fill.filled_b, amt(10));
        assert_eq!(state.tracked_orders(), 1);
    }

    #[test]
    fn test_cancel_never_decreases() {
        let mut state = BatchState::new().with_filled(h(1), amt(80), amt(8));
        state.cancel(h(1), &amt(50));
        assert_eq!(state.filled_s(&h(1)), amt(80));
        state.cancel(h(1), &amt(100));
        assert_eq!(state.filled_s(&h(1)), amt(100));
    }

    #[test]
    fn test_spending_is_tracked_per_key() {
        let mut state = BatchState::new();
        let token = TokenId::from("LRC");
        state.spend_by_order(h(1), token.clone(), &amt(5));
        state.spend_by_order(h(1), token.clone(), &amt(3));
        state.spend_by_account(Address::from("miner"), token.clone(), &amt(2));
        assert_eq!(state.spent_by_order(&h(1), &token), amt(8));
        assert!(state.spent_by_order(&h(2), &token).is_zero());
        assert_eq!(state.spent_by_account(&Address::from("miner"), &token), amt(2));
    }

    #[test]
    fn test_state_root_depends_on_contents() {
        let a = BatchState::new().with_filled(h(1), amt(1), amt(1));
        let b = BatchState::new().with_filled(h(1), amt(1), amt(1));
        let c = BatchState::new().with_filled(h(1), amt(2), amt(1));
        assert_eq!(a.state_root(), b.state_root());
        assert_ne!(a.state_root(), c.state_root());
        assert_ne!(a.state_root(), BatchState::new().state_root());
    }
}
