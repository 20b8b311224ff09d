//! Scenario descriptions: the JSON surface of the engine.
//!
//! ## Input
//!
//! ```json
//! {
//!   "rings": [[0, 1]],
//!   "orders": [
//!     { "tokenS": "A", "tokenB": "B", "amountS": 3e18, "amountB": 1e18 },
//!     { "tokenS": "B", "tokenB": "A", "amountS": 1e18, "amountB": 3e18, "balanceS": 5e17 }
//!   ],
//!   "transactionOrigin": "0xorigin",
//!   "feeRecipient": "0xfees",
//!   "miner": "0xminer"
//! }
//! ```
//!
//! `rings[k]` holds indices into `orders`. Amounts are JSON numbers or
//! strings, exponent notation included. An order with a non-zero fee
//! percentage settles in P2P mode and any fixed fee it declares is ignored.
//!
//! ## Expected result
//!
//! ```json
//! { "rings": [ { "fail": true }, { "orders": [ { "filledFraction": 0.5, "margin": 5e18, "P2P": false } ] } ] }
//! ```

use std::fmt;
use std::path::Path;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::book::{BatchState, OrderArena};
use crate::config::{SettlementConfig, SettlementContext};
use crate::engine::{BatchSettler, DigestVerifier, StaticBalances};
use crate::error::ScenarioError;
use crate::types::amount::{serde_amount, Amount};
use crate::types::{
    Address, BatchReport, BatchResult, FeeMode, FeeSelection, Order, OrderKey, Ring, RingResult, TokenId,
};

/// Largest filledFraction difference accepted by [`ScenarioExpectation::check`]
pub const FRACTION_TOLERANCE: f64 = 1e-6;

// ============================================================================
// Input
// ============================================================================

/// One order of a scenario
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioOrder {
    pub token_s: TokenId,
    pub token_b: TokenId,
    #[serde(with = "serde_amount")]
    pub amount_s: Amount,
    #[serde(with = "serde_amount")]
    pub amount_b: Amount,
    #[serde(default)]
    pub owner: Option<Address>,
    #[serde(default)]
    pub token_recipient: Option<Address>,
    #[serde(default)]
    pub fee_token: Option<TokenId>,
    #[serde(default, with = "serde_amount::option")]
    pub fee_amount: Option<Amount>,
    #[serde(default)]
    pub token_s_fee_percentage: Option<u32>,
    #[serde(default)]
    pub token_b_fee_percentage: Option<u32>,
    #[serde(default)]
    pub fee_selection: Option<FeeSelection>,
    #[serde(default)]
    pub all_or_none: bool,
    #[serde(default)]
    pub buy_no_more_than_amount_b: bool,
    #[serde(default)]
    pub valid_since: Option<u64>,
    #[serde(default)]
    pub valid_until: Option<u64>,
    #[serde(default)]
    pub wallet_addr: Option<Address>,
    #[serde(default)]
    pub wallet_split_percentage: Option<u8>,
    #[serde(default)]
    pub waive_fee_percentage: Option<i16>,
    #[serde(default)]
    pub dual_auth_addr: Option<Address>,
    /// Hex-encoded owner signature
    #[serde(default)]
    pub signature: Option<String>,
    /// Hex-encoded dual-authority signature
    #[serde(default)]
    pub dual_auth_signature: Option<String>,
    /// Spendable tokenS
    #[serde(default, with = "serde_amount::option")]
    pub balance_s: Option<Amount>,
    /// Spendable fee token. When the fee token is tokenS this adds to
    /// `balanceS`; without a `balanceS` tokenS stays unbounded.
    #[serde(default, with = "serde_amount::option")]
    pub balance_fee: Option<Amount>,
    #[serde(default)]
    pub salt: Option<u64>,
}

impl ScenarioOrder {
    /// Build the engine order. `index` names default owners and salts so
    /// that otherwise identical scenario orders stay distinct.
    pub fn to_order(&self, index: usize) -> Result<Order, ScenarioError> {
        let pct_s = self.token_s_fee_percentage.unwrap_or(0);
        let pct_b = self.token_b_fee_percentage.unwrap_or(0);
        let fee = if pct_s > 0 || pct_b > 0 {
            FeeMode::Percentage {
                token_s: pct_s,
                token_b: pct_b,
            }
        } else {
            FeeMode::FixedFee {
                token: self.fee_token.clone(),
                amount: self.fee_amount.clone().unwrap_or_default(),
            }
        };

        let decode = |field: &str, sig: &Option<String>| -> Result<Option<Vec<u8>>, ScenarioError> {
            sig.as_deref()
                .map(|s| {
                    hex::decode(s.trim_start_matches("0x")).map_err(|e| ScenarioError::BadOrder {
                        index,
                        reason: format!("{field}: {e}"),
                    })
                })
                .transpose()
        };

        Ok(Order {
            owner: self
                .owner
                .clone()
                .unwrap_or_else(|| Address(format!("owner{index}"))),
            token_s: self.token_s.clone(),
            token_b: self.token_b.clone(),
            amount_s: self.amount_s.clone(),
            amount_b: self.amount_b.clone(),
            fee,
            fee_selection: self.fee_selection.unwrap_or_default(),
            all_or_none: self.all_or_none,
            buy_no_more_than_amount_b: self.buy_no_more_than_amount_b,
            valid_since: self.valid_since,
            valid_until: self.valid_until,
            token_recipient: self.token_recipient.clone(),
            wallet: self.wallet_addr.clone(),
            wallet_split_percentage: self.wallet_split_percentage,
            waive_fee_percentage: self.waive_fee_percentage.unwrap_or(0),
            dual_auth: self.dual_auth_addr.clone(),
            signature: decode("signature", &self.signature)?,
            dual_auth_signature: decode("dualAuthSignature", &self.dual_auth_signature)?,
            salt: self.salt.unwrap_or(index as u64),
        })
    }
}

/// Spendable amount of an account (miner lrcReward funding)
#[derive(Debug, Clone, Deserialize)]
pub struct AccountBalance {
    pub owner: Address,
    pub token: TokenId,
    #[serde(with = "serde_amount")]
    pub amount: Amount,
}

/// A batch of rings over a set of orders
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub rings: Vec<Vec<usize>>,
    pub orders: Vec<ScenarioOrder>,
    #[serde(default)]
    pub transaction_origin: Option<Address>,
    #[serde(default)]
    pub fee_recipient: Option<Address>,
    #[serde(default)]
    pub miner: Option<Address>,
    /// Reference time for validity windows
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub balances: Vec<AccountBalance>,
    /// Optional embedded expectation
    #[serde(default)]
    pub expected: Option<ScenarioExpectation>,
}

/// A settled scenario
#[derive(Debug)]
pub struct ScenarioRun {
    pub arena: OrderArena,
    pub rings: Vec<Ring>,
    pub context: SettlementContext,
    pub state: BatchState,
    pub result: BatchResult,
}

impl ScenarioRun {
    /// Report in the expected-result shape
    pub fn report(&self) -> BatchReport {
        self.result.report()
    }
}

impl Scenario {
    /// Parse a scenario from JSON
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a scenario file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Settlement context; `reference_time` overrides the scenario timestamp
    pub fn context(&self, reference_time: Option<u64>) -> SettlementContext {
        SettlementContext::new(
            self.transaction_origin
                .clone()
                .unwrap_or_else(|| Address::from("origin")),
            self.fee_recipient.clone(),
            self.miner.clone(),
            reference_time.or(self.timestamp).unwrap_or(0),
        )
    }

    /// Settle the scenario from an empty state
    pub fn run(&self, config: &SettlementConfig) -> Result<ScenarioRun, ScenarioError> {
        self.run_with(config, &BatchState::new(), self.context(None))
    }

    /// Settle the scenario from `initial` under `context`
    pub fn run_with(
        &self,
        config: &SettlementConfig,
        initial: &BatchState,
        context: SettlementContext,
    ) -> Result<ScenarioRun, ScenarioError> {
        let mut arena = OrderArena::with_capacity(self.orders.len());
        let mut oracle = StaticBalances::new();
        let mut keys: Vec<OrderKey> = Vec::with_capacity(self.orders.len());

        for (index, raw) in self.orders.iter().enumerate() {
            let order = raw.to_order(index)?;
            let hash = order.hash();
            if let Some(balance) = &raw.balance_s {
                oracle.set_order(hash, order.token_s.clone(), balance.clone());
            }
            if let Some(balance) = &raw.balance_fee {
                let token = raw
                    .fee_token
                    .clone()
                    .unwrap_or_else(|| config.protocol_fee_token.clone());
                if token != order.token_s {
                    oracle.set_order(hash, token, balance.clone());
                } else if let Some(sold) = &raw.balance_s {
                    // Fee and sale draw on one tokenS balance
                    oracle.set_order(hash, token, sold + balance);
                }
            }
            keys.push(arena.insert(order));
        }
        for balance in &self.balances {
            oracle.set_account(balance.owner.clone(), balance.token.clone(), balance.amount.clone());
        }

        let rings = self
            .rings
            .iter()
            .enumerate()
            .map(|(ring, indices)| {
                indices
                    .iter()
                    .map(|&index| {
                        keys.get(index).copied().ok_or(ScenarioError::OrderIndexOutOfRange {
                            ring,
                            index,
                            count: keys.len(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Ring::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(orders = arena.len(), rings = rings.len(), "scenario loaded");
        let settler = BatchSettler::new(config, &oracle, &DigestVerifier);
        let (state, result) = settler.settle(&arena, initial, &rings, &context);

        Ok(ScenarioRun {
            arena,
            rings,
            context,
            state,
            result,
        })
    }
}

// ============================================================================
// Expectations
// ============================================================================

/// Expected per-order outcome
#[derive(Debug, Clone, Deserialize)]
pub struct ExpectedOrder {
    #[serde(rename = "filledFraction")]
    pub filled_fraction: f64,
    #[serde(default, with = "serde_amount::option")]
    pub margin: Option<Amount>,
    #[serde(rename = "P2P", default)]
    pub p2p: Option<bool>,
}

/// Expected ring outcome.
///
/// `{ "fail": true }` expects a failure. `{ "orders": [...] }` expects a
/// settlement with those per-order outcomes, and `{ "fail": false }` expects
/// a settlement without checking its orders.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawExpectedRing")]
pub enum ExpectedRing {
    Failed,
    Settled { orders: Option<Vec<ExpectedOrder>> },
}

#[derive(Deserialize)]
struct RawExpectedRing {
    #[serde(default)]
    fail: Option<bool>,
    #[serde(default)]
    orders: Option<Vec<ExpectedOrder>>,
}

impl TryFrom<RawExpectedRing> for ExpectedRing {
    type Error = String;

    fn try_from(raw: RawExpectedRing) -> Result<Self, Self::Error> {
        match (raw.fail, raw.orders) {
            (Some(true), None) => Ok(ExpectedRing::Failed),
            (Some(true), Some(_)) => Err("a ring expected to fail cannot list orders".into()),
            (None, None) => Err("expected ring needs `fail` or `orders`".into()),
            (_, orders) => Ok(ExpectedRing::Settled { orders }),
        }
    }
}

/// Expected batch outcome
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioExpectation {
    pub rings: Vec<ExpectedRing>,
}

/// One difference between a result and its expectation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub ring: usize,
    pub order: Option<usize>,
    pub message: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order {
            Some(order) => write!(f, "ring {} order {}: {}", self.ring, order, self.message),
            None => write!(f, "ring {}: {}", self.ring, self.message),
        }
    }
}

impl ScenarioExpectation {
    /// Parse an expectation from JSON
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Compare a batch result; an empty list means everything matched
    pub fn check(&self, result: &BatchResult) -> Vec<Mismatch> {
        let mut out = Vec::new();
        if self.rings.len() != result.rings.len() {
            out.push(Mismatch {
                ring: 0,
                order: None,
                message: format!(
                    "expected {} rings, got {}",
                    self.rings.len(),
                    result.rings.len()
                ),
            });
        }

        let tolerance = Decimal::from_f64(FRACTION_TOLERANCE).unwrap_or_default();
        for (k, (expected, actual)) in self.rings.iter().zip(&result.rings).enumerate() {
            let mismatch = |order, message: String| Mismatch { ring: k, order, message };
            match (expected, actual) {
                (ExpectedRing::Failed, RingResult::Failed(_)) => {}
                (ExpectedRing::Failed, RingResult::Settled(_)) => {
                    out.push(mismatch(None, "expected failure, ring settled".into()));
                }
                (ExpectedRing::Settled { .. }, RingResult::Failed(failure)) => {
                    out.push(mismatch(None, format!("expected settlement, ring failed: {}", failure.error)));
                }
                (ExpectedRing::Settled { orders: None }, RingResult::Settled(_)) => {}
                (ExpectedRing::Settled { orders: Some(orders) }, RingResult::Settled(settlement)) => {
                    if orders.len() != settlement.orders.len() {
                        out.push(mismatch(
                            None,
                            format!("expected {} orders, got {}", orders.len(), settlement.orders.len()),
                        ));
                    }
                    for (i, (want, got)) in orders.iter().zip(&settlement.orders).enumerate() {
                        let fraction_ok = Decimal::from_f64(want.filled_fraction)
                            .map(|want| (want - got.filled_fraction).abs() <= tolerance)
                            .unwrap_or(false);
                        if !fraction_ok {
                            out.push(mismatch(
                                Some(i),
                                format!("filledFraction {} != {}", got.filled_fraction, want.filled_fraction),
                            ));
                        }
                        if let Some(margin) = &want.margin {
                            if *margin != got.fees.margin {
                                out.push(mismatch(Some(i), format!("margin {} != {}", got.fees.margin, margin)));
                            }
                        }
                        if let Some(p2p) = want.p2p {
                            if p2p != got.p2p {
                                out.push(mismatch(Some(i), format!("P2P {} != {}", got.p2p, p2p)));
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
