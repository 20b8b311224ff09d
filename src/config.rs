//! Settlement configuration and per-batch context.
//!
//! Every optional order field resolves its default here instead of at the
//! point of use.

use serde::{Deserialize, Serialize};

use crate::types::{Address, TokenId};

/// Basis-point denominator for percentage fees
pub const FEE_PERCENTAGE_BASE: u32 = 10_000;

/// Which unit all-or-none orders are checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AllOrNoneScope {
    /// The entire remaining amount must fill within one ring
    #[default]
    Ring,
    /// The order must be completely filled by the end of the batch
    Batch,
}

/// Deployment-wide settlement parameters.
///
/// ## Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `protocol_fee_token` | `LRC` |
/// | `fee_percentage_base` | 10 000 (basis points) |
/// | `max_fee_percentage` | 9 999 |
/// | `rounding_tolerance_bps` | 100 (1%) |
/// | `default_wallet_split_percentage` | 50 |
/// | `max_ring_size` | 8 |
/// | `require_signatures` | true |
/// | `all_or_none_scope` | `ring` |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Fee token for fixed-fee orders that name none
    pub protocol_fee_token: TokenId,
    /// Denominator of percentage fees
    pub fee_percentage_base: u32,
    /// Largest accepted tokenS/tokenB fee percentage
    pub max_fee_percentage: u32,
    /// Largest accepted rounding error versus an order's own rate
    pub rounding_tolerance_bps: u32,
    /// Wallet split for orders that have a wallet but no split
    pub default_wallet_split_percentage: u8,
    /// Largest ring accepted
    pub max_ring_size: usize,
    /// Reject orders without an owner signature
    pub require_signatures: bool,
    /// All-or-none enforcement scope
    pub all_or_none_scope: AllOrNoneScope,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            protocol_fee_token: TokenId::from("LRC"),
            fee_percentage_base: FEE_PERCENTAGE_BASE,
            max_fee_percentage: FEE_PERCENTAGE_BASE - 1,
            rounding_tolerance_bps: 100,
            default_wallet_split_percentage: 50,
            max_ring_size: 8,
            require_signatures: true,
            all_or_none_scope: AllOrNoneScope::Ring,
        }
    }
}

impl SettlementConfig {
    /// Configuration for pure simulation: signatures are not required
    pub fn simulation() -> Self {
        Self {
            require_signatures: false,
            ..Self::default()
        }
    }

    /// Builder-style all-or-none scope override
    pub fn with_all_or_none_scope(mut self, scope: AllOrNoneScope) -> Self {
        self.all_or_none_scope = scope;
        self
    }

    /// Load from a JSON document; absent fields keep their defaults.
    ///
    /// A zero `fee_percentage_base` is rejected: percentage fees divide by it.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(json)?;
        if config.fee_percentage_base == 0 {
            return Err(<serde_json::Error as serde::de::Error>::custom(
                "fee_percentage_base must be positive",
            ));
        }
        Ok(config)
    }
}

/// Who submits the batch and when
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettlementContext {
    /// Account that submits the settlement transaction
    pub transaction_origin: Address,
    /// Account that receives the miner's share of fees and margin
    pub fee_recipient: Address,
    /// Account that funds lrcReward payments and margin rebates
    pub miner: Address,
    /// Time against which validity windows are checked
    pub reference_time: u64,
}

impl SettlementContext {
    /// Build a context; `fee_recipient` defaults to the origin and `miner`
    /// to the fee recipient
    pub fn new(
        transaction_origin: Address,
        fee_recipient: Option<Address>,
        miner: Option<Address>,
        reference_time: u64,
    ) -> Self {
        let fee_recipient = fee_recipient.unwrap_or_else(|| transaction_origin.clone());
        let miner = miner.unwrap_or_else(|| fee_recipient.clone());
        Self {
            transaction_origin,
            fee_recipient,
            miner,
            reference_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SettlementConfig::default();
        assert_eq!(config.fee_percentage_base, 10_000);
        assert_eq!(config.rounding_tolerance_bps, 100);
        assert!(config.require_signatures);
        assert!(!SettlementConfig::simulation().require_signatures);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            SettlementConfig::from_json(r#"{"max_ring_size": 4, "all_or_none_scope": "batch"}"#)
                .unwrap();
        assert_eq!(config.max_ring_size, 4);
        assert_eq!(config.all_or_none_scope, AllOrNoneScope::Batch);
        assert_eq!(config.protocol_fee_token, TokenId::from("LRC"));
    }

    #[test]
    fn test_zero_fee_base_rejected() {
        let err = SettlementConfig::from_json(r#"{"fee_percentage_base": 0}"#).unwrap_err();
        assert!(err.to_string().contains("fee_percentage_base"));
        assert!(SettlementConfig::from_json(r#"{"fee_percentage_base": 1000}"#).is_ok());
    }

    #[test]
    fn test_context_defaults_chain() {
        let ctx = SettlementContext::new(Address::from("origin"), None, None, 0);
        assert_eq!(ctx.fee_recipient, Address::from("origin"));
        assert_eq!(ctx.miner, Address::from("origin"));

        let ctx = SettlementContext::new(
            Address::from("origin"),
            Some(Address::from("fees")),
            None,
            0,
        );
        assert_eq!(ctx.miner, Address::from("fees"));
    }
}
