//! Balance and allowance bounds.
//!
//! The engine never reads chain state itself. A [`BalanceOracle`] reports how
//! much of a token an order (or an account such as the miner) may spend;
//! `None` means "unknown", which the engine treats as unbounded, so the
//! order's declared amounts are the only limit.
//!
//! [`Spendable`] layers the batch's own consumption on top of the oracle, so
//! a bound is shared by every ring of the batch.

use std::collections::HashMap;

use crate::book::BatchState;
use crate::types::{Address, Amount, OrderHash, TokenId};

/// External balance/allowance bounds
pub trait BalanceOracle: Send + Sync {
    /// Amount of `token` the order's owner can spend for this order
    fn order_spendable(&self, order: &OrderHash, token: &TokenId) -> Option<Amount>;

    /// Amount of `token` an account can spend
    fn account_spendable(&self, account: &Address, token: &TokenId) -> Option<Amount>;
}

/// Oracle with no data: every bound is unknown
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl BalanceOracle for Unbounded {
    fn order_spendable(&self, _order: &OrderHash, _token: &TokenId) -> Option<Amount> {
        None
    }

    fn account_spendable(&self, _account: &Address, _token: &TokenId) -> Option<Amount> {
        None
    }
}

/// Oracle backed by fixed tables (simulation and tests)
#[derive(Debug, Clone, Default)]
pub struct StaticBalances {
    orders: HashMap<(OrderHash, TokenId), Amount>,
    accounts: HashMap<(Address, TokenId), Amount>,
}

impl StaticBalances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an order's spendable amount of a token
    pub fn set_order(&mut self, order: OrderHash, token: TokenId, amount: Amount) {
        self.orders.insert((order, token), amount);
    }

    /// Set an account's spendable amount of a token
    pub fn set_account(&mut self, account: Address, token: TokenId, amount: Amount) {
        self.accounts.insert((account, token), amount);
    }

    /// Builder form of [`StaticBalances::set_order`]
    pub fn with_order(mut self, order: OrderHash, token: impl Into<TokenId>, amount: Amount) -> Self {
        self.set_order(order, token.into(), amount);
        self
    }

    /// Builder form of [`StaticBalances::set_account`]
    pub fn with_account(
        mut self,
        account: impl Into<Address>,
        token: impl Into<TokenId>,
        amount: Amount,
    ) -> Self {
        self.set_account(account.into(), token.into(), amount);
        self
    }
}

impl BalanceOracle for StaticBalances {
    fn order_spendable(&self, order: &OrderHash, token: &TokenId) -> Option<Amount> {
        self.orders.get(&(*order, token.clone())).cloned()
    }

    fn account_spendable(&self, account: &Address, token: &TokenId) -> Option<Amount> {
        self.accounts.get(&(account.clone(), token.clone())).cloned()
    }
}

/// Oracle bounds minus what the batch has already consumed
#[derive(Clone, Copy)]
pub struct Spendable<'a> {
    oracle: &'a dyn BalanceOracle,
    state: &'a BatchState,
}

impl<'a> Spendable<'a> {
    pub fn new(oracle: &'a dyn BalanceOracle, state: &'a BatchState) -> Self {
        Self { oracle, state }
    }

    /// What an order can still spend of `token`; `None` is unbounded
    pub fn order(&self, hash: &OrderHash, token: &TokenId) -> Option<Amount> {
        let bound = self.oracle.order_spendable(hash, token)?;
        let spent = self.state.spent_by_order(hash, token);
        Some(saturating_sub(&bound, &spent))
    }

    /// What an account can still spend of `token`; `None` is unbounded
    pub fn account(&self, account: &Address, token: &TokenId) -> Option<Amount> {
        let bound = self.oracle.account_spendable(account, token)?;
        let spent = self.state.spent_by_account(account, token);
        Some(saturating_sub(&bound, &spent))
    }
}

/// `a - b`, floored at zero
pub fn saturating_sub(a: &Amount, b: &Amount) -> Amount {
    if a > b {
        a - b
    } else {
        Amount::default()
    }
}

/// `min(value, bound)` where a missing bound is unbounded
pub fn clamp_to(value: Amount, bound: Option<&Amount>) -> Amount {
    match bound {
        Some(b) if *b < value => b.clone(),
        _ => value,
    }
}
