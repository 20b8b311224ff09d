//! Settlement receipt for a processed batch.
//!
//! The receipt commits to the order fill state after the batch, so an
//! independent execution of the same batch can be checked by comparing
//! 32 bytes.

use ssz_rs::prelude::*;

use crate::book::BatchState;
use crate::types::BatchResult;

/// Summary of one settled batch.
///
/// ## State Root
///
/// `state_root` is [`BatchState::state_root`]: a SHA-256 digest over every
/// order's filled amounts, in order-hash order.
///
/// ## Example
///
/// ```
/// use ring_settlement::types::SettlementReceipt;
///
/// let receipt = SettlementReceipt::new(
///     1,                      // batch_id
///     10,                     // rings_submitted
///     7,                      // rings_settled
///     [0u8; 32],              // state_root
///     1703577600,             // timestamp
/// );
/// assert_eq!(receipt.rings_failed(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
pub struct SettlementReceipt {
    /// Batch sequence number
    pub batch_id: u64,

    /// Rings submitted in this batch
    pub rings_submitted: u64,

    /// Rings that settled
    pub rings_settled: u64,

    /// Fill state root after the batch (SHA-256, 32 bytes)
    pub state_root: [u8; 32],

    /// Reference time the batch was settled at
    pub timestamp: u64,
}

impl SettlementReceipt {
    /// Create a receipt from its parts
    pub fn new(
        batch_id: u64,
        rings_submitted: u64,
        rings_settled: u64,
        state_root: [u8; 32],
        timestamp: u64,
    ) -> Self {
        Self {
            batch_id,
            rings_submitted,
            rings_settled,
            state_root,
            timestamp,
        }
    }

    /// Build the receipt for a settled batch and the state it produced
    pub fn from_batch(batch_id: u64, result: &BatchResult, state: &BatchState, timestamp: u64) -> Self {
        Self::new(
            batch_id,
            result.rings.len() as u64,
            result.settled_count() as u64,
            state.state_root(),
            timestamp,
        )
    }

    /// State root as a hex string
    pub fn state_root_hex(&self) -> String {
        hex::encode(self.state_root)
    }

    /// Rings that failed
    pub fn rings_failed(&self) -> u64 {
        self.rings_submitted.saturating_sub(self.rings_settled)
    }

    /// Whether no ring was submitted
    pub fn is_empty(&self) -> bool {
        self.rings_submitted == 0
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_new() {
        let receipt = SettlementReceipt::new(1, 10, 4, [1u8; 32], 1703577600);
        assert_eq!(receipt.batch_id, 1);
        assert_eq!(receipt.rings_submitted, 10);
        assert_eq!(receipt.rings_settled, 4);
        assert_eq!(receipt.rings_failed(), 6);
        assert!(!receipt.is_empty());
    }

    #[test]
    fn test_receipt_from_empty_batch() {
        let state = BatchState::new();
        let receipt = SettlementReceipt::from_batch(3, &BatchResult::default(), &state, 0);
        assert!(receipt.is_empty());
        assert_eq!(receipt.state_root, state.state_root());
    }

    #[test]
    fn test_receipt_state_root_hex() {
        let receipt = SettlementReceipt::new(1, 0, 0, [0xAB; 32], 0);
        let hex = receipt.state_root_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_receipt_ssz_size() {
        let receipt = SettlementReceipt::new(1, 2, 1, [0u8; 32], 0);
        let bytes = ssz_rs::serialize(&receipt).expect("Failed to serialize");

        // 8 + 8 + 8 + 32 + 8
        assert_eq!(bytes.len(), 64);
    }

    #[test]
    fn test_receipt_ssz_deterministic() {
        let receipt = SettlementReceipt::new(7, 3, 2, [0x11; 32], 99);
        let bytes1 = ssz_rs::serialize(&receipt).expect("Failed to serialize");
        let bytes2 = ssz_rs::serialize(&receipt).expect("Failed to serialize");
        assert_eq!(bytes1, bytes2);

        let decoded: SettlementReceipt = ssz_rs::deserialize(&bytes1).expect("Failed to deserialize");
        assert_eq!(decoded, receipt);
    }
}
