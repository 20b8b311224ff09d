//! Settlement results.
//!
//! A ring either settles ([`RingSettlement`]) or fails ([`RingFailure`]).
//! [`BatchResult`] keeps one [`RingResult`] per submitted ring in
//! submission order and renders the scenario report shape:
//!
//! ```json
//! { "rings": [ { "fail": true },
//!              { "orders": [ { "filledFraction": 0.5, "margin": "5000000000000000000", "P2P": false } ] } ] }
//! ```

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{FailureKind, SettlementError};
use crate::types::amount::{serde_amount, Amount};
use crate::types::{Address, OrderHash, OrderKey, TokenId};

// ============================================================================
// FeeItem
// ============================================================================

/// Fees, margin and rewards of one order in one ring
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeeItem {
    /// Fee taken from the sold tokenS (P2P mode)
    pub fee_s: Amount,
    /// Fee taken from the bought tokenB
    pub fee_b: Amount,
    /// Fixed fee paid in `fee_token` from the owner's balance
    pub fee_lrc: Amount,
    /// Fee-token amount the miner pays back to the order
    pub lrc_reward: Amount,
    /// tokenS surplus beyond what the buying order required
    pub margin: Amount,
    /// tokenB the miner pays the order out of its margin pool
    pub rebate: Amount,
    /// Token in which `fee_lrc` and `lrc_reward` are denominated
    pub fee_token: TokenId,
    /// Effective wallet share of fees and margin, 0 without a wallet
    pub wallet_split_percentage: u8,
    /// The fixed fee was clamped to the owner's spendable balance
    pub fee_clamped: bool,
}

// ============================================================================
// Ring outcomes
// ============================================================================

/// One order's settled position in a ring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledOrder {
    /// Arena key
    pub key: OrderKey,
    /// Order hash
    pub hash: OrderHash,
    /// Seller of tokenS
    pub owner: Address,
    /// Receiver of tokenB
    pub recipient: Address,
    /// Fee-sharing wallet
    pub wallet: Option<Address>,
    /// Token sold
    pub token_s: TokenId,
    /// Token bought
    pub token_b: TokenId,
    /// Declared sell amount
    pub amount_s: Amount,
    /// tokenS given up in this ring (includes fee_s and margin)
    pub fill_s: Amount,
    /// tokenB bought in this ring before fee_b
    pub fill_b: Amount,
    /// Fee breakdown
    pub fees: FeeItem,
    /// `fill_s / amount_s`
    pub filled_fraction: Decimal,
    /// Percentage fee mode
    pub p2p: bool,
}

/// A successfully settled ring
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RingSettlement {
    /// Orders in ring order
    pub orders: Vec<SettledOrder>,
}

/// Ring evaluation states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RingStage {
    Pending,
    Validating,
    Propagating,
    FeeComputing,
    Success,
    Failed,
}

/// A failed ring: the stage it failed in and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingFailure {
    /// Stage that reported the failure
    pub stage: RingStage,
    /// Failure reason
    pub error: SettlementError,
}

impl RingFailure {
    /// Coarse failure class
    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }
}

/// Outcome of one ring
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingResult {
    Settled(RingSettlement),
    Failed(RingFailure),
}

impl RingResult {
    /// Whether the ring settled
    pub fn is_settled(&self) -> bool {
        matches!(self, RingResult::Settled(_))
    }

    /// Settlement, if any
    pub fn settlement(&self) -> Option<&RingSettlement> {
        match self {
            RingResult::Settled(s) => Some(s),
            RingResult::Failed(_) => None,
        }
    }

    /// Failure, if any
    pub fn failure(&self) -> Option<&RingFailure> {
        match self {
            RingResult::Settled(_) => None,
            RingResult::Failed(f) => Some(f),
        }
    }

    /// Scenario report shape
    pub fn report(&self) -> RingReport {
        match self {
            RingResult::Failed(_) => RingReport::Failed { fail: true },
            RingResult::Settled(s) => RingReport::Settled {
                orders: s
                    .orders
                    .iter()
                    .map(|o| OrderReport {
                        filled_fraction: o.filled_fraction,
                        margin: o.fees.margin.clone(),
                        p2p: o.p2p,
                    })
                    .collect(),
            },
        }
    }
}

/// Results of a batch in submission order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchResult {
    pub rings: Vec<RingResult>,
}

impl BatchResult {
    /// Number of rings that settled
    pub fn settled_count(&self) -> usize {
        self.rings.iter().filter(|r| r.is_settled()).count()
    }

    /// Scenario report shape
    pub fn report(&self) -> BatchReport {
        BatchReport {
            rings: self.rings.iter().map(RingResult::report).collect(),
        }
    }
}

// ============================================================================
// Report shape
// ============================================================================

/// Per-order line of a settled ring report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderReport {
    #[serde(rename = "filledFraction", with = "rust_decimal::serde::float")]
    pub filled_fraction: Decimal,
    #[serde(with = "serde_amount")]
    pub margin: Amount,
    #[serde(rename = "P2P")]
    pub p2p: bool,
}

/// Ring report: `{ "fail": true }` or `{ "orders": [...] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RingReport {
    Failed { fail: bool },
    Settled { orders: Vec<OrderReport> },
}

/// Batch report: `{ "rings": [...] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub rings: Vec<RingReport>,
}

// ============================================================================
// Unit Tests
// ============================================================================
