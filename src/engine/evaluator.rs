//! Single-ring evaluation.
//!
//! ## State Machine
//!
//! ```text
//! Pending -> Validating -> Propagating -> FeeComputing -> Success
//!                \______________\______________\__________-> Failed
//! ```
//!
//! The first component that reports an error moves the ring to `Failed`;
//! the failure records the stage it happened in. Evaluation reads the batch
//! state but never writes it: applying a settled ring is the settler's job,
//! so a failed ring has no effect at all.

use tracing::{debug, trace};

use crate::book::{BatchState, OrderArena, OrderFillState};
use crate::config::{AllOrNoneScope, SettlementConfig, SettlementContext};
use crate::engine::balances::{saturating_sub, BalanceOracle, Spendable};
use crate::engine::fees::FeeEngine;
use crate::engine::propagator::{FillPropagator, RingFills};
use crate::engine::validator::{OrderValidator, SignatureVerifier};
use crate::error::{SettlementError, StructuralIssue};
use crate::types::amount::fraction;
use crate::types::{
    FeeItem, Order, OrderHash, OrderKey, Ring, RingFailure, RingResult, RingSettlement, RingStage,
    SettledOrder,
};

/// One order as seen by a ring under evaluation
#[derive(Debug, Clone)]
pub struct Participant<'a> {
    /// Arena key
    pub key: OrderKey,
    /// Cached order hash
    pub hash: OrderHash,
    /// The order
    pub order: &'a Order,
    /// Fill state before this ring
    pub fill: OrderFillState,
}

/// Evaluates rings against a snapshot of the batch state
pub struct RingEvaluator<'a> {
    config: &'a SettlementConfig,
    oracle: &'a dyn BalanceOracle,
    verifier: &'a dyn SignatureVerifier,
}

impl<'a> RingEvaluator<'a> {
    pub fn new(
        config: &'a SettlementConfig,
        oracle: &'a dyn BalanceOracle,
        verifier: &'a dyn SignatureVerifier,
    ) -> Self {
        Self {
            config,
            oracle,
            verifier,
        }
    }

    /// Evaluate one ring.
    ///
    /// # Arguments
    ///
    /// * `arena` - Orders the ring's keys refer to
    /// * `state` - Fill state and balance consumption of earlier rings
    /// * `ring` - The ring to evaluate
    /// * `ctx` - Miner and reference time
    pub fn evaluate(
        &self,
        arena: &OrderArena,
        state: &BatchState,
        ring: &Ring,
        ctx: &SettlementContext,
    ) -> RingResult {
        let mut stage = RingStage::Pending;
        match self.run(arena, state, ring, ctx, &mut stage) {
            Ok(settlement) => {
                debug!(orders = ring.len(), "ring settled");
                RingResult::Settled(settlement)
            }
            Err(error) => {
                debug!(?stage, %error, "ring failed");
                RingResult::Failed(RingFailure { stage, error })
            }
        }
    }

    fn run(
        &self,
        arena: &OrderArena,
        state: &BatchState,
        ring: &Ring,
        ctx: &SettlementContext,
        stage: &mut RingStage,
    ) -> Result<RingSettlement, SettlementError> {
        advance(stage, RingStage::Validating);
        let participants = self.resolve(arena, state, ring)?;
        let orders: Vec<&Order> = participants.iter().map(|p| p.order).collect();
        ring.check_structure(&orders, self.config.max_ring_size)?;

        let validator = OrderValidator::new(self.config, self.verifier);
        for (i, p) in participants.iter().enumerate() {
            validator.validate(i, p.order, &p.hash, &p.fill, ctx.reference_time)?;
        }

        advance(stage, RingStage::Propagating);
        let spendable = Spendable::new(self.oracle, state);
        let fills = FillPropagator::new(self.config).compute_fills(&participants, &spendable)?;

        advance(stage, RingStage::FeeComputing);
        let fees = FeeEngine::new(self.config).compute_fees(&participants, &fills, &spendable, ctx)?;

        if self.config.all_or_none_scope == AllOrNoneScope::Ring {
            check_all_or_none(&participants, &fills)?;
        }

        advance(stage, RingStage::Success);
        Ok(build_settlement(&participants, fills, fees))
    }

    fn resolve<'o>(
        &self,
        arena: &'o OrderArena,
        state: &BatchState,
        ring: &Ring,
    ) -> Result<Vec<Participant<'o>>, SettlementError> {
        ring.orders
            .iter()
            .map(|&key| -> Result<Participant<'o>, SettlementError> {
                let slot = arena.slot(key).ok_or(StructuralIssue::UnknownOrder(key))?;
                Ok(Participant {
                    key,
                    hash: slot.hash,
                    order: &slot.order,
                    fill: state.fill_state(&slot.hash),
                })
            })
            .collect()
    }
}

fn advance(stage: &mut RingStage, next: RingStage) {
    trace!(from = ?*stage, to = ?next, "ring stage");
    *stage = next;
}

/// Every all-or-none order must fill its entire remaining amount
fn check_all_or_none(participants: &[Participant<'_>], fills: &RingFills) -> Result<(), SettlementError> {
    for (i, p) in participants.iter().enumerate() {
        if !p.order.all_or_none {
            continue;
        }
        let complete = if p.order.buy_no_more_than_amount_b {
            fills.fill_b[i] == saturating_sub(&p.order.amount_b, &p.fill.filled_b)
        } else {
            fills.fill_s[i] == saturating_sub(&p.order.amount_s, &p.fill.filled_s)
        };
        if !complete {
            return Err(SettlementError::AllOrNoneUnmet { index: i });
        }
    }
    Ok(())
}

fn build_settlement(participants: &[Participant<'_>], fills: RingFills, fees: Vec<FeeItem>) -> RingSettlement {
    let orders = participants
        .iter()
        .zip(fills.fill_s)
        .zip(fills.fill_b)
        .zip(fees)
        .map(|(((p, fill_s), fill_b), fees)| SettledOrder {
            key: p.key,
            hash: p.hash,
            owner: p.order.owner.clone(),
            recipient: p.order.recipient().clone(),
            wallet: p.order.wallet.clone(),
            token_s: p.order.token_s.clone(),
            token_b: p.order.token_b.clone(),
            amount_s: p.order.amount_s.clone(),
            filled_fraction: fraction(&fill_s, &p.order.amount_s),
            fill_s,
            fill_b,
            fees,
            p2p: p.order.is_p2p(),
        })
        .collect();
    RingSettlement { orders }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::balances::{StaticBalances, Unbounded};
    use crate::engine::validator::AcceptAll;
    use crate::error::{FailureKind, OrderRejection};
    use crate::types::amount::parse_amount;
    use crate::types::{Address, Amount};
    use rust_decimal::Decimal;

    fn a(s: &str) -> Amount {
        parse_amount(s).unwrap()
    }

    fn ctx() -> SettlementContext {
        SettlementContext::new(Address::from("origin"), None, None, 1_000)
    }

    fn evaluate(arena: &OrderArena, ring: Vec<OrderKey>, oracle: &dyn BalanceOracle) -> RingResult {
        let config = SettlementConfig::simulation();
        RingEvaluator::new(&config, oracle, &AcceptAll).evaluate(arena, &BatchState::new(), &Ring::new(ring), &ctx())
    }

    #[test]
    fn test_matching_ring_settles() {
        let mut arena = OrderArena::new();
        let k0 = arena.insert(Order::new("o0", "A", "B", a("3e18"), a("1e18")));
        let k1 = arena.insert(Order::new("o1", "B", "A", a("1e18"), a("3e18")));

        let result = evaluate(&arena, vec![k0, k1], &Unbounded);
        let settlement = result.settlement().unwrap();
        assert_eq!(settlement.orders.len(), 2);
        for order in &settlement.orders {
            assert_eq!(order.filled_fraction, Decimal::ONE);
            assert!(order.fees.margin == Amount::from(0u32));
        }
    }

    #[test]
    fn test_unknown_key_fails_validation() {
        let mut arena = OrderArena::new();
        let k0 = arena.insert(Order::new("o0", "A", "B", a("1"), a("1")));
        let failure = evaluate(&arena, vec![k0, 42], &Unbounded).failure().cloned().unwrap();
        assert_eq!(failure.stage, RingStage::Validating);
        assert_eq!(failure.error, SettlementError::StructuralMismatch(StructuralIssue::UnknownOrder(42)));
    }

    #[test]
    fn test_token_mismatch() {
        let mut arena = OrderArena::new();
        let k0 = arena.insert(Order::new("o0", "A", "B", a("1"), a("1")));
        let k1 = arena.insert(Order::new("o1", "C", "A", a("1"), a("1")));
        let failure = evaluate(&arena, vec![k0, k1], &Unbounded).failure().cloned().unwrap();
        assert_eq!(failure.kind(), FailureKind::StructuralMismatch);
    }

    #[test]
    fn test_expired_order_fails_ring() {
        let mut arena = OrderArena::new();
        let k0 = arena.insert(Order::new("o0", "A", "B", a("1"), a("1")).with_validity(None, Some(999)));
        let k1 = arena.insert(Order::new("o1", "B", "A", a("1"), a("1")));
        let failure = evaluate(&arena, vec![k0, k1], &Unbounded).failure().cloned().unwrap();
        assert_eq!(
            failure.error,
            SettlementError::OrderInvalid { index: 0, reason: OrderRejection::Expired(999) }
        );
    }

    #[test]
    fn test_all_or_none_unmet_fails_whole_ring() {
        let mut arena = OrderArena::new();
        let o0 = Order::new("o0", "X", "Y", a("100e18"), a("10e18")).with_all_or_none(true);
        let o1 = Order::new("o1", "Y", "X", a("20e18"), a("200e18"));
        let oracle = StaticBalances::new().with_order(o1.hash(), "Y", a("5e18"));
        let k0 = arena.insert(o0);
        let k1 = arena.insert(o1);

        let failure = evaluate(&arena, vec![k0, k1], &oracle).failure().cloned().unwrap();
        assert_eq!(failure.error, SettlementError::AllOrNoneUnmet { index: 0 });
        assert_eq!(failure.stage, RingStage::FeeComputing);
    }

    #[test]
    fn test_batch_scope_defers_all_or_none() {
        let mut arena = OrderArena::new();
        let o0 = Order::new("o0", "X", "Y", a("100e18"), a("10e18")).with_all_or_none(true);
        let o1 = Order::new("o1", "Y", "X", a("5e18"), a("50e18"));
        let k0 = arena.insert(o0);
        let k1 = arena.insert(o1);

        let config = SettlementConfig::simulation().with_all_or_none_scope(AllOrNoneScope::Batch);
        let result = RingEvaluator::new(&config, &Unbounded, &AcceptAll).evaluate(
            &arena,
            &BatchState::new(),
            &Ring::new(vec![k0, k1]),
            &ctx(),
        );
        assert!(result.is_settled());
    }

    #[test]
    fn test_reads_prior_fill_state() {
        let mut arena = OrderArena::new();
        let o0 = Order::new("o0", "A", "B", a("100"), a("100"));
        let hash = o0.hash();
        let k0 = arena.insert(o0);
        let k1 = arena.insert(Order::new("o1", "B", "A", a("100"), a("100")));
        let state = BatchState::new().with_filled(hash, a("70"), a("70"));

        let config = SettlementConfig::simulation();
        let result = RingEvaluator::new(&config, &Unbounded, &AcceptAll).evaluate(
            &arena,
            &state,
            &Ring::new(vec![k0, k1]),
            &ctx(),
        );
        let settlement = result.settlement().unwrap();
        assert_eq!(settlement.orders[0].fill_s, a("30"));
        assert_eq!(settlement.orders[1].fill_s, a("30"));
    }

    #[test]
    fn test_buy_limited_all_or_none_measured_on_bought_side() {
        let mut arena = OrderArena::new();
        let mut o0 = Order::new("o0", "A", "B", a("100"), a("100")).with_all_or_none(true);
        o0.buy_no_more_than_amount_b = true;
        let hash = o0.hash();
        let o1 = Order::new("o1", "B", "A", a("100"), a("100"));
        let o1_hash = o1.hash();
        let k0 = arena.insert(o0);
        let k1 = arena.insert(o1);
        // 30 B left to buy while 50 A are still unsold
        let state = BatchState::new().with_filled(hash, a("50"), a("70"));
        let ring = Ring::new(vec![k0, k1]);
        let config = SettlementConfig::simulation();

        let result = RingEvaluator::new(&config, &Unbounded, &AcceptAll).evaluate(&arena, &state, &ring, &ctx());
        let settlement = result.settlement().unwrap();
        assert_eq!(settlement.orders[0].fill_b, a("30"));
        assert_eq!(settlement.orders[0].fill_s, a("30"));

        // The seller can only deliver 20 of the 30
        let oracle = StaticBalances::new().with_order(o1_hash, "B", a("20"));
        let failure = RingEvaluator::new(&config, &oracle, &AcceptAll)
            .evaluate(&arena, &state, &ring, &ctx())
            .failure()
            .cloned()
            .unwrap();
        assert_eq!(failure.error, SettlementError::AllOrNoneUnmet { index: 0 });
    }
}
