//! Fee, margin and reward computation.
//!
//! ## Regimes
//!
//! Each order carries its own [`FeeMode`], so a ring may mix both regimes.
//!
//! - **Fixed fee** (order-book mode): the order owes
//!   `floor(fee_amount * fill_s / amount_s)` of its fee token. The fee is taken
//!   from the bought tokens when the fee token is tokenB and the order keeps
//!   its own proceeds; otherwise it is drawn from the fee-token balance and
//!   clamped to what is spendable. Under [`FeeSelection::MarginSplit`] the
//!   miner refunds the fee as `lrc_reward` when the order produced margin.
//! - **Percentage** (P2P mode): `fee_s` and `fee_b` are basis-point cuts of
//!   the sold and bought legs. `fee_s` already shaped the propagation.
//!
//! ## Waivers
//!
//! A positive `waive_fee_percentage` forgives part of the miner's fee. A
//! negative one pays the order a share of the miner's margin pool in its
//! tokenB; the negative shares of a ring may not add up to more than 100%.

use std::collections::HashMap;

use num_traits::Zero;

use crate::config::{SettlementConfig, SettlementContext};
use crate::engine::balances::{saturating_sub, Spendable};
use crate::engine::propagator::RingFills;
use crate::engine::Participant;
use crate::error::{FeeIssue, SettlementError};
use crate::types::amount::{mul_div, scale};
use crate::types::{Amount, FeeItem, FeeMode, FeeSelection, Order, TokenId};

/// Split `amount` into `(wallet, miner)` shares
pub fn split_amount(amount: &Amount, wallet_percentage: u8) -> (Amount, Amount) {
    let wallet = scale(amount, u32::from(wallet_percentage), 100);
    let miner = amount - &wallet;
    (wallet, miner)
}

/// Computes the [`FeeItem`] of every order in a ring
pub struct FeeEngine<'a> {
    config: &'a SettlementConfig,
}

impl<'a> FeeEngine<'a> {
    pub fn new(config: &'a SettlementConfig) -> Self {
        Self { config }
    }

    /// Fees, margins, rewards and rebates for a propagated ring
    pub fn compute_fees(
        &self,
        participants: &[Participant<'_>],
        fills: &RingFills,
        spendable: &Spendable<'_>,
        ctx: &SettlementContext,
    ) -> Result<Vec<FeeItem>, SettlementError> {
        let oversplit: u32 = participants
            .iter()
            .filter(|p| p.order.waive_fee_percentage < 0)
            .map(|p| u32::from(p.order.waive_fee_percentage.unsigned_abs()))
            .sum();
        if oversplit > 100 {
            return Err(FeeIssue::MinerOversplit { total: oversplit }.into());
        }

        let n = participants.len();
        let mut items = Vec::with_capacity(n);
        // Miner fee-token budget left for lrcReward payments in this ring
        let mut miner_budget: HashMap<TokenId, Option<Amount>> = HashMap::new();

        for (i, p) in participants.iter().enumerate() {
            let prev = (i + n - 1) % n;
            let order = p.order;
            let fill_s = &fills.fill_s[i];
            let fill_b = &fills.fill_b[i];

            let mut item = FeeItem {
                fee_token: self.fee_token(order),
                wallet_split_percentage: self.wallet_split(order),
                ..Default::default()
            };

            match &order.fee {
                FeeMode::Percentage { token_s, token_b } => {
                    item.fee_s = scale(fill_s, *token_s, self.config.fee_percentage_base);
                    item.fee_b = waived(
                        scale(fill_b, *token_b, self.config.fee_percentage_base),
                        order.waive_fee_percentage,
                    );
                }
                FeeMode::FixedFee { amount, .. } => {
                    let owed = if order.buy_no_more_than_amount_b {
                        mul_div(amount, fill_b, &order.amount_b)
                    } else {
                        mul_div(amount, fill_s, &order.amount_s)
                    };
                    let owed = waived(owed, order.waive_fee_percentage);

                    let from_proceeds = item.fee_token == order.token_b
                        && order.recipient() == &order.owner
                        && *fill_b >= owed;
                    if from_proceeds {
                        item.fee_b = owed;
                    } else {
                        let available = match spendable.order(&p.hash, &item.fee_token) {
                            Some(balance) if item.fee_token == order.token_s => {
                                Some(saturating_sub(&balance, fill_s))
                            }
                            other => other,
                        };
                        item.fee_lrc = match available {
                            Some(balance) if balance < owed => {
                                item.fee_clamped = true;
                                balance
                            }
                            _ => owed,
                        };
                    }
                }
            }

            let delivered = fill_s - &item.fee_s;
            if delivered < fills.fill_b[prev] {
                return Err(SettlementError::PriceNotMet { index: prev });
            }
            item.margin = delivered - &fills.fill_b[prev];

            if order.fee_selection == FeeSelection::MarginSplit
                && !order.is_p2p()
                && !item.margin.is_zero()
                && !item.fee_lrc.is_zero()
                && !item.fee_clamped
            {
                let budget = miner_budget
                    .entry(item.fee_token.clone())
                    .or_insert_with(|| spendable.account(&ctx.miner, &item.fee_token));
                match budget {
                    None => item.lrc_reward = item.fee_lrc.clone(),
                    Some(left) if *left >= item.fee_lrc => {
                        *left -= &item.fee_lrc;
                        item.lrc_reward = item.fee_lrc.clone();
                    }
                    Some(_) => {}
                }
            }

            items.push(item);
        }

        self.apply_rebates(participants, &mut items);
        Ok(items)
    }

    /// Pay negative-waive orders their share of the miner's margin pool
    fn apply_rebates(&self, participants: &[Participant<'_>], items: &mut [FeeItem]) {
        let mut pool: HashMap<&TokenId, Amount> = HashMap::new();
        for (p, item) in participants.iter().zip(items.iter()) {
            let (_, miner) = split_amount(&item.margin, item.wallet_split_percentage);
            *pool.entry(&p.order.token_s).or_default() += miner;
        }

        for (p, item) in participants.iter().zip(items.iter_mut()) {
            let waive = p.order.waive_fee_percentage;
            if waive >= 0 {
                continue;
            }
            if let Some(available) = pool.get(&p.order.token_b) {
                item.rebate = scale(available, u32::from(waive.unsigned_abs()), 100);
            }
        }
    }

    fn fee_token(&self, order: &Order) -> TokenId {
        match &order.fee {
            FeeMode::FixedFee { token: Some(token), .. } => token.clone(),
            _ => self.config.protocol_fee_token.clone(),
        }
    }

    fn wallet_split(&self, order: &Order) -> u8 {
        match order.wallet {
            Some(_) => order
                .wallet_split_percentage
                .unwrap_or(self.config.default_wallet_split_percentage),
            None => 0,
        }
    }
}

/// Apply a positive waiver to a fee
fn waived(fee: Amount, waive_percentage: i16) -> Amount {
    if waive_percentage <= 0 {
        return fee;
    }
    let forgiven = scale(&fee, u32::from(waive_percentage.unsigned_abs()), 100);
    fee - forgiven
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{BatchState, OrderFillState};
    use crate::engine::balances::{BalanceOracle, StaticBalances, Unbounded};
    use crate::types::amount::parse_amount;
    use crate::types::Address;

    fn a(s: &str) -> Amount {
        parse_amount(s).unwrap()
    }

    fn ctx() -> SettlementContext {
        SettlementContext::new(Address::from("origin"), None, Some(Address::from("miner")), 0)
    }

    fn run(
        orders: &[Order],
        fill_s: &[&str],
        fill_b: &[&str],
        oracle: &dyn BalanceOracle,
    ) -> Result<Vec<FeeItem>, SettlementError> {
        let config = SettlementConfig::simulation();
        let state = BatchState::new();
        let participants: Vec<_> = orders
            .iter()
            .enumerate()
            .map(|(key, order)| Participant {
                key,
                hash: order.hash(),
                order,
                fill: OrderFillState::default(),
            })
            .collect();
        let fills = RingFills {
            fill_s: fill_s.iter().map(|s| a(s)).collect(),
            fill_b: fill_b.iter().map(|s| a(s)).collect(),
        };
        FeeEngine::new(&config).compute_fees(&participants, &fills, &Spendable::new(oracle, &state), &ctx())
    }

    fn gap_orders() -> Vec<Order> {
        vec![
            Order::new("o0", "X", "Y", a("100"), a("10")),
            Order::new("o1", "Y", "X", a("5"), a("45")),
        ]
    }

    #[test]
    fn test_split_amount() {
        assert_eq!(split_amount(&a("101"), 50), (a("50"), a("51")));
        assert_eq!(split_amount(&a("10"), 0), (a("0"), a("10")));
        assert_eq!(split_amount(&a("10"), 100), (a("10"), a("0")));
    }

    #[test]
    fn test_margin_goes_to_better_priced_order() {
        let items = run(&gap_orders(), &["50", "5"], &["5", "45"], &Unbounded).unwrap();
        assert_eq!(items[0].margin, a("5"));
        assert!(items[1].margin.is_zero());
    }

    #[test]
    fn test_price_not_met() {
        let err = run(&gap_orders(), &["40", "5"], &["5", "45"], &Unbounded).unwrap_err();
        assert_eq!(err, SettlementError::PriceNotMet { index: 1 });
    }

    #[test]
    fn test_fixed_fee_scales_with_fill() {
        let mut orders = gap_orders();
        orders[0] = orders[0].clone().with_fee(FeeMode::FixedFee { token: None, amount: a("10") });
        let items = run(&orders, &["50", "5"], &["5", "45"], &Unbounded).unwrap();
        assert_eq!(items[0].fee_lrc, a("5"));
        assert_eq!(items[0].fee_token, TokenId::from("LRC"));
        assert!(!items[0].fee_clamped);
    }

    #[test]
    fn test_fixed_fee_clamped_to_balance() {
        let mut orders = gap_orders();
        orders[0] = orders[0].clone().with_fee(FeeMode::FixedFee { token: None, amount: a("10") });
        let oracle = StaticBalances::new().with_order(orders[0].hash(), "LRC", a("2"));
        let items = run(&orders, &["50", "5"], &["5", "45"], &oracle).unwrap();
        assert_eq!(items[0].fee_lrc, a("2"));
        assert!(items[0].fee_clamped);
    }

    #[test]
    fn test_fee_in_token_s_uses_unsold_balance() {
        let mut orders = gap_orders();
        orders[0] = orders[0]
            .clone()
            .with_fee(FeeMode::FixedFee { token: Some(TokenId::from("X")), amount: a("10") });
        let oracle = StaticBalances::new().with_order(orders[0].hash(), "X", a("53"));
        let items = run(&orders, &["50", "5"], &["5", "45"], &oracle).unwrap();
        assert_eq!(items[0].fee_lrc, a("3"));
        assert!(items[0].fee_clamped);
    }

    #[test]
    fn test_fee_in_token_b_taken_from_proceeds() {
        let mut orders = gap_orders();
        orders[0] = orders[0]
            .clone()
            .with_fee(FeeMode::FixedFee { token: Some(TokenId::from("Y")), amount: a("2") });
        let items = run(&orders, &["50", "5"], &["5", "45"], &Unbounded).unwrap();
        assert_eq!(items[0].fee_b, a("1"));
        assert!(items[0].fee_lrc.is_zero());
    }

    #[test]
    fn test_positive_waive_reduces_fee() {
        let mut orders = gap_orders();
        orders[0] = orders[0]
            .clone()
            .with_fee(FeeMode::FixedFee { token: None, amount: a("100") })
            .with_waive_fee_percentage(40);
        let items = run(&orders, &["50", "5"], &["5", "45"], &Unbounded).unwrap();
        assert_eq!(items[0].fee_lrc, a("30"));
    }

    #[test]
    fn test_percentage_fees() {
        let orders = vec![
            Order::new("o0", "A", "B", a("1000"), a("1000"))
                .with_fee(FeeMode::Percentage { token_s: 100, token_b: 250 }),
            Order::new("o1", "B", "A", a("1000"), a("1000")),
        ];
        let items = run(&orders, &["1000", "990"], &["990", "990"], &Unbounded).unwrap();
        assert_eq!(items[0].fee_s, a("10"));
        assert_eq!(items[0].fee_b, a("24"));
        assert!(items[0].fee_lrc.is_zero());
        assert!(items[1].margin.is_zero());
    }

    #[test]
    fn test_positive_waive_reduces_p2p_token_b_fee() {
        let orders = vec![
            Order::new("o0", "A", "B", a("1000"), a("1000"))
                .with_fee(FeeMode::Percentage { token_s: 100, token_b: 250 })
                .with_waive_fee_percentage(30),
            Order::new("o1", "B", "A", a("1000"), a("1000")),
        ];
        let items = run(&orders, &["1000", "990"], &["990", "990"], &Unbounded).unwrap();
        // 24 - floor(24 * 30 / 100)
        assert_eq!(items[0].fee_b, a("17"));
        // tokenS fee is part of the fill and is not waived
        assert_eq!(items[0].fee_s, a("10"));
    }

    #[test]
    fn test_margin_split_pays_lrc_reward() {
        let mut orders = gap_orders();
        let mut o0 = orders[0].clone().with_fee(FeeMode::FixedFee { token: None, amount: a("10") });
        o0.fee_selection = FeeSelection::MarginSplit;
        orders[0] = o0;

        let items = run(&orders, &["50", "5"], &["5", "45"], &Unbounded).unwrap();
        assert_eq!(items[0].lrc_reward, a("5"));

        let poor_miner = StaticBalances::new().with_account("miner", "LRC", a("4"));
        let items = run(&orders, &["50", "5"], &["5", "45"], &poor_miner).unwrap();
        assert!(items[0].lrc_reward.is_zero());
    }

    #[test]
    fn test_clamped_fee_forfeits_reward() {
        let mut orders = gap_orders();
        let mut o0 = orders[0].clone().with_fee(FeeMode::FixedFee { token: None, amount: a("10") });
        o0.fee_selection = FeeSelection::MarginSplit;
        let oracle = StaticBalances::new().with_order(o0.hash(), "LRC", a("1"));
        orders[0] = o0;
        let items = run(&orders, &["50", "5"], &["5", "45"], &oracle).unwrap();
        assert!(items[0].fee_clamped);
        assert!(items[0].lrc_reward.is_zero());
    }

    #[test]
    fn test_wallet_split_defaults() {
        let mut orders = gap_orders();
        orders[0].wallet = Some(Address::from("wallet"));
        orders[1] = orders[1].clone().with_wallet("wallet", 30);
        let items = run(&orders, &["50", "5"], &["5", "45"], &Unbounded).unwrap();
        assert_eq!(items[0].wallet_split_percentage, 50);
        assert_eq!(items[1].wallet_split_percentage, 30);
    }

    #[test]
    fn test_negative_waive_rebate_from_margin_pool() {
        let mut orders = gap_orders();
        orders[1] = orders[1].clone().with_waive_fee_percentage(-60);
        let items = run(&orders, &["50", "5"], &["5", "45"], &Unbounded).unwrap();
        // o0's margin (5 X) is the pool, o1 buys X
        assert_eq!(items[1].rebate, a("3"));
        assert!(items[0].rebate.is_zero());
    }

    #[test]
    fn test_miner_oversplit() {
        let mut orders = gap_orders();
        orders[0] = orders[0].clone().with_waive_fee_percentage(-60);
        orders[1] = orders[1].clone().with_waive_fee_percentage(-50);
        let err = run(&orders, &["50", "5"], &["5", "45"], &Unbounded).unwrap_err();
        assert_eq!(err, SettlementError::FeeOvercommit(FeeIssue::MinerOversplit { total: 110 }));
    }
}
