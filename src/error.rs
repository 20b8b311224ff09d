//! Error taxonomy.
//!
//! Ring failures are values, not aborts: a [`SettlementError`] marks one ring
//! as failed inside the batch result and the batch fold carries on. Only
//! loading problems ([`ScenarioError`]) surface as `Err` from the public API.

use thiserror::Error;

use crate::types::amount::AmountParseError;

/// Coarse failure classes reported per ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// tokenB/tokenS chain broken, self ring, sub-ring
    StructuralMismatch,
    /// Bad signature, expired, zero amount, already fully consumed
    OrderInvalid,
    /// Fill rounds to dust, exceeds rounding tolerance, or cannot fill at all
    DustOrRounding,
    /// An all-or-none order did not fill completely
    AllOrNoneUnmet,
    /// Fee percentages or waivers overcommit the miner
    FeeOvercommit,
}

/// Why a ring is structurally unsettleable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralIssue {
    #[error("ring has {0} orders, at least 2 are required")]
    TooShort(usize),
    #[error("ring has {len} orders, at most {max} are allowed")]
    TooLong { len: usize, max: usize },
    #[error("order {index} buys a different token than order {next} sells")]
    TokenMismatch { index: usize, next: usize },
    #[error("token sold by order {index} is sold again later in the ring (sub-ring)")]
    SubRing { index: usize },
    #[error("order {index} appears more than once in the ring")]
    DuplicateOrder { index: usize },
    #[error("ring references unknown order key {0}")]
    UnknownOrder(usize),
}

/// Why a single order is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderRejection {
    #[error("amountS or amountB is zero")]
    ZeroAmount,
    #[error("order sells and buys the same token")]
    SameToken,
    #[error("signature missing")]
    MissingSignature,
    #[error("signature does not verify")]
    BadSignature,
    #[error("dual-authority signature missing or invalid")]
    BadDualAuthSignature,
    #[error("order not valid before {0}")]
    NotYetValid(u64),
    #[error("order expired at {0}")]
    Expired(u64),
    #[error("order is already fully filled")]
    FullyFilled,
    #[error("wallet split percentage {0} exceeds 100")]
    BadWalletSplit(u8),
}

/// Why the fee configuration of a ring cannot be honoured
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeeIssue {
    #[error("order {index} fee percentage {bps} exceeds the maximum {max}")]
    PercentageTooHigh { index: usize, bps: u32, max: u32 },
    #[error("order {index} waive percentage {pct} is outside -100..=100")]
    WaiveOutOfRange { index: usize, pct: i16 },
    #[error("miner splits {total}% of its margin, more than 100%")]
    MinerOversplit { total: u32 },
}

/// Reason a ring failed to settle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("structural mismatch: {0}")]
    StructuralMismatch(StructuralIssue),

    #[error("order {index} invalid: {reason}")]
    OrderInvalid { index: usize, reason: OrderRejection },

    #[error("order {index} has nothing it can fill")]
    ZeroFill { index: usize },

    #[error("order {index} fill rounds the bought amount to zero")]
    Dust { index: usize },

    #[error("order {index} rounding error exceeds tolerance")]
    RoundingError { index: usize },

    #[error("order {index} does not meet its counter-order's price")]
    PriceNotMet { index: usize },

    #[error("all-or-none order {index} is not completely filled")]
    AllOrNoneUnmet { index: usize },

    #[error("fee overcommit: {0}")]
    FeeOvercommit(FeeIssue),
}

impl SettlementError {
    /// Map onto the coarse failure class
    pub fn kind(&self) -> FailureKind {
        match self {
            SettlementError::StructuralMismatch(_) => FailureKind::StructuralMismatch,
            SettlementError::OrderInvalid { .. } => FailureKind::OrderInvalid,
            SettlementError::ZeroFill { .. }
            | SettlementError::Dust { .. }
            | SettlementError::RoundingError { .. }
            | SettlementError::PriceNotMet { .. } => FailureKind::DustOrRounding,
            SettlementError::AllOrNoneUnmet { .. } => FailureKind::AllOrNoneUnmet,
            SettlementError::FeeOvercommit(_) => FailureKind::FeeOvercommit,
        }
    }
}

impl From<StructuralIssue> for SettlementError {
    fn from(issue: StructuralIssue) -> Self {
        SettlementError::StructuralMismatch(issue)
    }
}

impl From<FeeIssue> for SettlementError {
    fn from(issue: FeeIssue) -> Self {
        SettlementError::FeeOvercommit(issue)
    }
}

/// Errors raised while loading or running a scenario description
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse scenario JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Amount(#[from] AmountParseError),

    #[error("ring {ring} references order index {index}, but only {count} orders exist")]
    OrderIndexOutOfRange { ring: usize, index: usize, count: usize },

    #[error("order {index}: {reason}")]
    BadOrder { index: usize, reason: String },
}
