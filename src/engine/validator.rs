//! Per-order validity checks.
//!
//! Validation is a pure predicate over one order, its current fill state and
//! the reference time. A failing order fails every ring that contains it.
//!
//! ## Checks (in order)
//!
//! 1. `amount_s > 0` and `amount_b > 0`, `token_s != token_b`
//! 2. Owner signature verifies (required unless the config is in simulation
//!    mode; a present signature is always verified)
//! 3. Dual-authority signature verifies when the order names a dual authority
//! 4. `valid_since <= reference_time <= valid_until` for each bound that is set
//! 5. Not already fully filled
//! 6. Wallet split within 0..=100
//! 7. Percentage fees at most `max_fee_percentage` and below 100% of the leg
//! 8. Waive percentage within -100..=100

use num_traits::Zero;
use sha2::{Digest, Sha256};

use crate::book::OrderFillState;
use crate::config::SettlementConfig;
use crate::error::{FeeIssue, OrderRejection, SettlementError};
use crate::types::{Address, FeeMode, Order, OrderHash};

/// External signature verification capability
pub trait SignatureVerifier: Send + Sync {
    /// Whether `signature` is `signer`'s signature over `message`
    fn verify(&self, signer: &Address, message: &OrderHash, signature: &[u8]) -> bool;
}

/// Verifier that accepts every signature
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl SignatureVerifier for AcceptAll {
    fn verify(&self, _signer: &Address, _message: &OrderHash, _signature: &[u8]) -> bool {
        true
    }
}

/// Deterministic stand-in signer: a signature is `SHA-256(signer || message)`.
///
/// Lets simulations and tests exercise the signature path without a real
/// key scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestVerifier;

impl DigestVerifier {
    /// Produce the signature `signer` would attach to `message`
    pub fn sign(signer: &Address, message: &OrderHash) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(signer.as_str().as_bytes());
        hasher.update(message.as_bytes());
        hasher.finalize().to_vec()
    }
}

impl SignatureVerifier for DigestVerifier {
    fn verify(&self, signer: &Address, message: &OrderHash, signature: &[u8]) -> bool {
        Self::sign(signer, message) == signature
    }
}

/// Order validity predicate
pub struct OrderValidator<'a> {
    config: &'a SettlementConfig,
    verifier: &'a dyn SignatureVerifier,
}

impl<'a> OrderValidator<'a> {
    pub fn new(config: &'a SettlementConfig, verifier: &'a dyn SignatureVerifier) -> Self {
        Self { config, verifier }
    }

    /// Validate the order at ring position `index`
    pub fn validate(
        &self,
        index: usize,
        order: &Order,
        hash: &OrderHash,
        fill: &OrderFillState,
        reference_time: u64,
    ) -> Result<(), SettlementError> {
        let invalid = |reason| SettlementError::OrderInvalid { index, reason };

        if order.amount_s.is_zero() || order.amount_b.is_zero() {
            return Err(invalid(OrderRejection::ZeroAmount));
        }
        if order.token_s == order.token_b {
            return Err(invalid(OrderRejection::SameToken));
        }

        match &order.signature {
            Some(sig) if !self.verifier.verify(&order.owner, hash, sig) => {
                return Err(invalid(OrderRejection::BadSignature));
            }
            None if self.config.require_signatures => {
                return Err(invalid(OrderRejection::MissingSignature));
            }
            _ => {}
        }
        if let Some(dual_auth) = &order.dual_auth {
            let ok = match &order.dual_auth_signature {
                Some(sig) => self.verifier.verify(dual_auth, hash, sig),
                None => !self.config.require_signatures,
            };
            if !ok {
                return Err(invalid(OrderRejection::BadDualAuthSignature));
            }
        }

        if let Some(since) = order.valid_since {
            if reference_time < since {
                return Err(invalid(OrderRejection::NotYetValid(since)));
            }
        }
        if let Some(until) = order.valid_until {
            if reference_time > until {
                return Err(invalid(OrderRejection::Expired(until)));
            }
        }

        let exhausted = if order.buy_no_more_than_amount_b {
            fill.filled_b >= order.amount_b
        } else {
            fill.filled_s >= order.amount_s
        };
        if exhausted {
            return Err(invalid(OrderRejection::FullyFilled));
        }

        if let Some(split) = order.wallet_split_percentage {
            if split > 100 {
                return Err(invalid(OrderRejection::BadWalletSplit(split)));
            }
        }

        self.validate_fees(index, order)
    }

    fn validate_fees(&self, index: usize, order: &Order) -> Result<(), SettlementError> {
        if let FeeMode::Percentage { token_s, token_b } = order.fee {
            let max = self.config.max_fee_percentage.min(self.config.fee_percentage_base.saturating_sub(1));
            for bps in [token_s, token_b] {
                if bps > max {
                    return Err(FeeIssue::PercentageTooHigh { index, bps, max }.into());
                }
            }
        }
        if !(-100..=100).contains(&order.waive_fee_percentage) {
            return Err(FeeIssue::WaiveOutOfRange { index, pct: order.waive_fee_percentage }.into());
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
