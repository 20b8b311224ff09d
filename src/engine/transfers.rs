//! Token transfers implied by settled rings.
//!
//! ## Legs per order `i` (order `i - 1` buys from order `i`)
//!
//! | Leg | From | To | Token |
//! |-----|------|----|-------|
//! | principal | owner `i` | recipient `i - 1` | tokenS `i` |
//! | feeB of `i - 1` | owner `i` | fee recipient / wallet `i - 1` | tokenS `i` |
//! | feeS, margin | owner `i` | fee recipient / wallet `i` | tokenS `i` |
//! | feeLrc | owner `i` | fee recipient / wallet `i` | fee token |
//! | lrcReward | miner | owner `i` | fee token |
//! | rebate | fee recipient | recipient `i` | tokenB `i` |
//!
//! Fees and margin are split with the order's wallet split percentage.
//! Zero-amount and self transfers are never emitted.

use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_traits::Zero;
use serde::Serialize;

use crate::config::SettlementContext;
use crate::engine::fees::split_amount;
use crate::types::amount::serde_amount;
use crate::types::{Address, Amount, BatchResult, RingSettlement, SettledOrder, TokenId};

/// A single token movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub token: TokenId,
    pub from: Address,
    pub to: Address,
    #[serde(with = "serde_amount")]
    pub amount: Amount,
    pub description: String,
}

/// Derives transfer lists from settlements
pub struct TransferPlanner<'a> {
    ctx: &'a SettlementContext,
}

impl<'a> TransferPlanner<'a> {
    pub fn new(ctx: &'a SettlementContext) -> Self {
        Self { ctx }
    }

    /// Transfers of one settled ring
    pub fn plan(&self, settlement: &RingSettlement) -> Vec<Transfer> {
        let mut out = Vec::new();
        let orders = &settlement.orders;
        let n = orders.len();

        for (i, order) in orders.iter().enumerate() {
            let buyer = &orders[(i + n - 1) % n];
            let fees = &order.fees;

            let principal = saturating(&buyer.fill_b, &buyer.fees.fee_b);
            push(&mut out, &order.token_s, &order.owner, &buyer.recipient, principal, "principal");

            self.push_split(&mut out, &order.token_s, &order.owner, buyer, &buyer.fees.fee_b, "feeB");
            self.push_split(&mut out, &order.token_s, &order.owner, order, &fees.fee_s, "feeS");
            self.push_split(&mut out, &order.token_s, &order.owner, order, &fees.margin, "margin");
            self.push_split(&mut out, &fees.fee_token, &order.owner, order, &fees.fee_lrc, "feeLrc");

            push(
                &mut out,
                &fees.fee_token,
                &self.ctx.miner,
                &order.owner,
                fees.lrc_reward.clone(),
                "lrcReward",
            );
            push(
                &mut out,
                &order.token_b,
                &self.ctx.fee_recipient,
                &order.recipient,
                fees.rebate.clone(),
                "rebate",
            );
        }

        out
    }

    /// Transfers of every settled ring of a batch, in ring order
    pub fn plan_batch(&self, result: &BatchResult) -> Vec<Transfer> {
        result
            .rings
            .iter()
            .filter_map(|ring| ring.settlement())
            .flat_map(|settlement| self.plan(settlement))
            .collect()
    }

    /// Pay `amount` from `from` to the fee recipient and `owner`'s wallet
    fn push_split(
        &self,
        out: &mut Vec<Transfer>,
        token: &TokenId,
        from: &Address,
        owner: &SettledOrder,
        amount: &Amount,
        description: &str,
    ) {
        if amount.is_zero() {
            return;
        }
        match &owner.wallet {
            Some(wallet) => {
                let (to_wallet, to_miner) = split_amount(amount, owner.fees.wallet_split_percentage);
                push(out, token, from, &self.ctx.fee_recipient, to_miner, description);
                push(out, token, from, wallet, to_wallet, &format!("{description} (wallet)"));
            }
            None => push(out, token, from, &self.ctx.fee_recipient, amount.clone(), description),
        }
    }
}

fn push(out: &mut Vec<Transfer>, token: &TokenId, from: &Address, to: &Address, amount: Amount, description: &str) {
    if amount.is_zero() || from == to {
        return;
    }
    out.push(Transfer {
        token: token.clone(),
        from: from.clone(),
        to: to.clone(),
        amount,
        description: description.to_string(),
    });
}

fn saturating(a: &Amount, b: &Amount) -> Amount {
    if a > b {
        a - b
    } else {
        Amount::zero()
    }
}

/// Net balance change per `(address, token)`; accounts that net to zero are
/// left out
pub fn net_deltas(transfers: &[Transfer]) -> BTreeMap<(Address, TokenId), BigInt> {
    let mut deltas: BTreeMap<(Address, TokenId), BigInt> = BTreeMap::new();
    for t in transfers {
        let amount = BigInt::from(t.amount.clone());
        *deltas.entry((t.from.clone(), t.token.clone())).or_default() -= &amount;
        *deltas.entry((t.to.clone(), t.token.clone())).or_default() += amount;
    }
    deltas.retain(|_, delta| !delta.is_zero());
    deltas
}

// ============================================================================
// Unit Tests
// ============================================================================
