//! Batch settlement: a sequential fold of rings over [`BatchState`].
//!
//! ## Ordering
//!
//! Rings are evaluated strictly in submission order. Ring `k` sees the fills
//! and balance consumption of every ring before it that settled; a failed
//! ring changes nothing and the fold carries on.
//!
//! ## All-or-none scope
//!
//! With [`AllOrNoneScope::Ring`] the evaluator enforces all-or-none per ring.
//! With [`AllOrNoneScope::Batch`] an all-or-none order may be filled by
//! several rings, as long as it ends the batch completely filled. Rings that
//! touch an order left incomplete are reverted to
//! [`SettlementError::AllOrNoneUnmet`] and the batch is replayed from the
//! initial state without them, until no order is left incomplete.
//!
//! ## Example
//!
//! ```
//! use ring_settlement::book::{BatchState, OrderArena};
//! use ring_settlement::config::{SettlementConfig, SettlementContext};
//! use ring_settlement::engine::{AcceptAll, BatchSettler, Unbounded};
//! use ring_settlement::types::{Address, Amount, Order, Ring};
//!
//! let mut arena = OrderArena::new();
//! let a = arena.insert(Order::new("alice", "A", "B", Amount::from(30u32), Amount::from(10u32)));
//! let b = arena.insert(Order::new("bob", "B", "A", Amount::from(10u32), Amount::from(30u32)));
//!
//! let config = SettlementConfig::simulation();
//! let settler = BatchSettler::new(&config, &Unbounded, &AcceptAll);
//! let ctx = SettlementContext::new(Address::from("miner"), None, None, 0);
//!
//! let rings = [Ring::new(vec![a, b]), Ring::new(vec![a, b])];
//! let (state, result) = settler.settle(&arena, &BatchState::new(), &rings, &ctx);
//!
//! // The second identical ring finds both orders exhausted
//! assert!(result.rings[0].is_settled());
//! assert!(!result.rings[1].is_settled());
//! assert_eq!(state.tracked_orders(), 2);
//! ```

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::book::{BatchState, OrderArena};
use crate::config::{AllOrNoneScope, SettlementConfig, SettlementContext};
use crate::engine::balances::BalanceOracle;
use crate::engine::evaluator::RingEvaluator;
use crate::engine::validator::SignatureVerifier;
use crate::error::SettlementError;
use crate::types::{BatchResult, Ring, RingFailure, RingResult, RingStage};

/// Folds a batch of rings over the order state
pub struct BatchSettler<'a> {
    config: &'a SettlementConfig,
    evaluator: RingEvaluator<'a>,
}

impl<'a> BatchSettler<'a> {
    pub fn new(
        config: &'a SettlementConfig,
        oracle: &'a dyn BalanceOracle,
        verifier: &'a dyn SignatureVerifier,
    ) -> Self {
        Self {
            config,
            evaluator: RingEvaluator::new(config, oracle, verifier),
        }
    }

    /// One step of the fold: `(state, ring) -> (state', result)`.
    ///
    /// The state is only updated when the ring settles.
    pub fn settle_ring(
        &self,
        arena: &OrderArena,
        mut state: BatchState,
        ring: &Ring,
        ctx: &SettlementContext,
    ) -> (BatchState, RingResult) {
        let result = self.evaluator.evaluate(arena, &state, ring, ctx);
        if let RingResult::Settled(settlement) = &result {
            state.apply(settlement, &ctx.miner);
        }
        (state, result)
    }

    /// Settle every ring of a batch in submission order.
    ///
    /// # Arguments
    ///
    /// * `arena` - Orders the rings refer to
    /// * `initial` - State left by earlier batches
    /// * `rings` - Rings in submission order
    /// * `ctx` - Transaction origin, fee recipient, miner and reference time
    ///
    /// # Returns
    ///
    /// The final state and one result per ring, in submission order.
    pub fn settle(
        &self,
        arena: &OrderArena,
        initial: &BatchState,
        rings: &[Ring],
        ctx: &SettlementContext,
    ) -> (BatchState, BatchResult) {
        let mut reverted: BTreeMap<usize, SettlementError> = BTreeMap::new();

        let (state, results) = loop {
            let (state, results) = self.fold(arena, initial, rings, ctx, &reverted);
            if self.config.all_or_none_scope == AllOrNoneScope::Ring {
                break (state, results);
            }

            let unmet = self.unmet_all_or_none(arena, &state, rings, &results);
            if unmet.is_empty() {
                break (state, results);
            }
            debug!(rings = ?unmet.keys().collect::<Vec<_>>(), "reverting rings with incomplete all-or-none orders");
            reverted.extend(unmet);
        };

        let result = BatchResult { rings: results };
        info!(
            submitted = rings.len(),
            settled = result.settled_count(),
            "batch settled"
        );
        (state, result)
    }

    fn fold(
        &self,
        arena: &OrderArena,
        initial: &BatchState,
        rings: &[Ring],
        ctx: &SettlementContext,
        reverted: &BTreeMap<usize, SettlementError>,
    ) -> (BatchState, Vec<RingResult>) {
        let mut state = initial.clone();
        let mut results = Vec::with_capacity(rings.len());

        for (k, ring) in rings.iter().enumerate() {
            if let Some(error) = reverted.get(&k) {
                results.push(RingResult::Failed(RingFailure {
                    stage: RingStage::FeeComputing,
                    error: error.clone(),
                }));
                continue;
            }
            let (next, result) = self.settle_ring(arena, state, ring, ctx);
            state = next;
            results.push(result);
        }

        (state, results)
    }

    /// Settled rings holding an all-or-none order the batch left incomplete
    fn unmet_all_or_none(
        &self,
        arena: &OrderArena,
        state: &BatchState,
        rings: &[Ring],
        results: &[RingResult],
    ) -> BTreeMap<usize, SettlementError> {
        let mut unmet = BTreeMap::new();
        for (k, (ring, result)) in rings.iter().zip(results).enumerate() {
            if !result.is_settled() {
                continue;
            }
            for (index, &key) in ring.orders.iter().enumerate() {
                let Some(slot) = arena.slot(key) else { continue };
                if !slot.order.all_or_none {
                    continue;
                }
                let fill = state.fill_state(&slot.hash);
                let complete = if slot.order.buy_no_more_than_amount_b {
                    fill.filled_b >= slot.order.amount_b
                } else {
                    fill.filled_s >= slot.order.amount_s
                };
                if !complete {
                    unmet.insert(k, SettlementError::AllOrNoneUnmet { index });
                    break;
                }
            }
        }
        unmet
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
