//! Order types for ring settlement.
//!
//! ## Identity
//!
//! An order is identified by its [`OrderHash`], a SHA-256 digest over a
//! canonical encoding of every field except the signatures. Two orders with
//! identical economic fields but different `salt` values hash differently
//! and are tracked as distinct orders.
//!
//! ## Fee regimes
//!
//! Every order carries exactly one [`FeeMode`]:
//!
//! - [`FeeMode::FixedFee`]: a fixed amount of a fee token, paid pro rata to
//!   the fill ("order-book" mode). An absent fee token means the protocol
//!   fee token.
//! - [`FeeMode::Percentage`]: basis-point fees on the tokenS and tokenB legs
//!   ("P2P" mode).

use std::fmt;

use num_traits::Zero;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::amount::Amount;

/// Domain separator mixed into every order hash
const ORDER_HASH_DOMAIN: &[u8] = b"ring-settlement/order/v1";

// ============================================================================
// Identifiers
// ============================================================================

/// An account address (order owner, wallet, miner, fee recipient)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

/// A token identifier (symbol or contract address)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub String);

macro_rules! string_id {
    ($t:ty) => {
        impl $t {
            /// Borrow the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $t {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $t {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(Address);
string_id!(TokenId);

/// SHA-256 order hash
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OrderHash(pub [u8; 32]);

impl OrderHash {
    /// Hex encoding of the hash
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for OrderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for OrderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps logs readable
        write!(f, "OrderHash(0x{}..)", &self.to_hex()[..12])
    }
}

// ============================================================================
// Fee configuration
// ============================================================================

/// Fee regime of a single order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeeMode {
    /// Fixed fee-token amount for a full fill, scaled to the actual fill
    FixedFee {
        /// Fee token; `None` means the protocol fee token
        token: Option<TokenId>,
        /// Fee owed for filling the whole order
        amount: Amount,
    },
    /// Basis-point fees on each leg ("P2P" settlement)
    Percentage {
        /// Fee on the sold amount, in basis points of tokenS
        token_s: u32,
        /// Fee on the bought amount, in basis points of tokenB
        token_b: u32,
    },
}

impl Default for FeeMode {
    fn default() -> Self {
        FeeMode::FixedFee {
            token: None,
            amount: Amount::zero(),
        }
    }
}

/// How the miner takes its cut from an order-book order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FeeSelection {
    /// The order pays its fixed fee
    #[default]
    Lrc,
    /// The miner lives off the margin and refunds the fixed fee as a reward
    MarginSplit,
}

impl FeeSelection {
    fn to_u8(self) -> u8 {
        match self {
            FeeSelection::Lrc => 0,
            FeeSelection::MarginSplit => 1,
        }
    }
}

// ============================================================================
// Order struct
// ============================================================================

/// A signed order offering `amount_s` of `token_s` for `amount_b` of `token_b`.
///
/// ## Example
///
/// ```
/// use ring_settlement::types::{Order, FeeMode};
/// use ring_settlement::types::amount::parse_amount;
///
/// let order = Order::new(
///     "alice",
///     "WETH",
///     "DAI",
///     parse_amount("1e18").unwrap(),
///     parse_amount("3000e18").unwrap(),
/// )
/// .with_all_or_none(true);
///
/// assert!(order.all_or_none);
/// assert!(!order.is_p2p());
/// assert_eq!(order.hash(), order.clone().hash());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Order {
    /// Account that signed the order and sells tokenS
    pub owner: Address,
    /// Token sold
    pub token_s: TokenId,
    /// Token bought
    pub token_b: TokenId,
    /// Amount of tokenS offered
    pub amount_s: Amount,
    /// Amount of tokenB requested
    pub amount_b: Amount,
    /// Fee regime
    pub fee: FeeMode,
    /// Miner's fee selection for order-book mode
    pub fee_selection: FeeSelection,
    /// Entire remaining amount must fill or nothing does
    pub all_or_none: bool,
    /// Limit the order by `amount_b` instead of `amount_s`
    pub buy_no_more_than_amount_b: bool,
    /// Inclusive start of the validity window
    pub valid_since: Option<u64>,
    /// Inclusive end of the validity window
    pub valid_until: Option<u64>,
    /// Receiver of the bought tokens, defaults to the owner
    pub token_recipient: Option<Address>,
    /// Wallet (referrer) that shares fees and margin with the miner
    pub wallet: Option<Address>,
    /// Share of fees and margin routed to the wallet, 0..=100
    pub wallet_split_percentage: Option<u8>,
    /// Miner fee waiver in percent, -100..=100
    pub waive_fee_percentage: i16,
    /// Second authority that must co-sign the order
    pub dual_auth: Option<Address>,
    /// Owner signature over the order hash
    pub signature: Option<Vec<u8>>,
    /// Dual-authority signature over the order hash
    pub dual_auth_signature: Option<Vec<u8>>,
    /// Distinguishes otherwise identical orders
    pub salt: u64,
}

impl Order {
    /// Create an order with default options (fixed fee of zero protocol tokens)
    pub fn new(
        owner: impl Into<Address>,
        token_s: impl Into<TokenId>,
        token_b: impl Into<TokenId>,
        amount_s: Amount,
        amount_b: Amount,
    ) -> Self {
        Self {
            owner: owner.into(),
            token_s: token_s.into(),
            token_b: token_b.into(),
            amount_s,
            amount_b,
            ..Default::default()
        }
    }

    /// Set the fee regime
    pub fn with_fee(mut self, fee: FeeMode) -> Self {
        self.fee = fee;
        self
    }

    /// Set the all-or-none flag
    pub fn with_all_or_none(mut self, all_or_none: bool) -> Self {
        self.all_or_none = all_or_none;
        self
    }

    /// Set the wallet and its split
    pub fn with_wallet(mut self, wallet: impl Into<Address>, split_percentage: u8) -> Self {
        self.wallet = Some(wallet.into());
        self.wallet_split_percentage = Some(split_percentage);
        self
    }

    /// Set the validity window
    pub fn with_validity(mut self, since: Option<u64>, until: Option<u64>) -> Self {
        self.valid_since = since;
        self.valid_until = until;
        self
    }

    /// Set the miner fee waiver percentage
    pub fn with_waive_fee_percentage(mut self, pct: i16) -> Self {
        self.waive_fee_percentage = pct;
        self
    }

    /// Set the owner signature
    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Whether the order settles in percentage ("P2P") fee mode
    pub fn is_p2p(&self) -> bool {
        matches!(self.fee, FeeMode::Percentage { .. })
    }

    /// tokenS fee in basis points (zero outside P2P mode)
    pub fn token_s_fee_bps(&self) -> u32 {
        match self.fee {
            FeeMode::Percentage { token_s, .. } => token_s,
            FeeMode::FixedFee { .. } => 0,
        }
    }

    /// tokenB fee in basis points (zero outside P2P mode)
    pub fn token_b_fee_bps(&self) -> u32 {
        match self.fee {
            FeeMode::Percentage { token_b, .. } => token_b,
            FeeMode::FixedFee { .. } => 0,
        }
    }

    /// Address that receives the bought tokens
    pub fn recipient(&self) -> &Address {
        self.token_recipient.as_ref().unwrap_or(&self.owner)
    }

    /// Compute the order hash.
    ///
    /// Each field is written as a one-byte tag, a little-endian `u32` length
    /// and the field bytes, so no two field layouts collide.
    pub fn hash(&self) -> OrderHash {
        let mut hasher = Sha256::new();
        hasher.update(ORDER_HASH_DOMAIN);

        let mut field = |tag: u8, bytes: &[u8]| {
            hasher.update([tag]);
            hasher.update((bytes.len() as u32).to_le_bytes());
            hasher.update(bytes);
        };
        let opt_addr = |a: &Option<Address>| a.as_ref().map(|a| a.0.clone()).unwrap_or_default();
        let opt_u64 = |v: Option<u64>| match v {
            Some(v) => [&[1u8][..], &v.to_le_bytes()[..]].concat(),
            None => vec![0u8],
        };

        field(0x01, self.owner.0.as_bytes());
        field(0x02, self.token_s.0.as_bytes());
        field(0x03, self.token_b.0.as_bytes());
        field(0x04, &self.amount_s.to_bytes_le());
        field(0x05, &self.amount_b.to_bytes_le());
        match &self.fee {
            FeeMode::FixedFee { token, amount } => {
                field(0x06, &[0]);
                field(0x07, token.as_ref().map(|t| t.0.as_bytes()).unwrap_or_default());
                field(0x08, &amount.to_bytes_le());
            }
            FeeMode::Percentage { token_s, token_b } => {
                field(0x06, &[1]);
                field(0x09, &token_s.to_le_bytes());
                field(0x0a, &token_b.to_le_bytes());
            }
        }
        field(0x0b, &[self.fee_selection.to_u8()]);
        field(0x0c, &[self.all_or_none as u8, self.buy_no_more_than_amount_b as u8]);
        field(0x0d, &opt_u64(self.valid_since));
        field(0x0e, &opt_u64(self.valid_until));
        field(0x0f, opt_addr(&self.token_recipient).as_bytes());
        field(0x10, opt_addr(&self.wallet).as_bytes());
        field(0x11, &[self.wallet_split_percentage.map(|p| p.saturating_add(1)).unwrap_or(0)]);
        field(0x12, &self.waive_fee_percentage.to_le_bytes());
        field(0x13, opt_addr(&self.dual_auth).as_bytes());
        field(0x14, &self.salt.to_le_bytes());

        OrderHash(hasher.finalize().into())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
