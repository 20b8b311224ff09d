//! Core data types for ring settlement
//!
//! ## Types
//!
//! - [`Order`]: A signed order, with its [`FeeMode`] and [`OrderHash`]
//! - [`Ring`]: A cycle of order keys
//! - [`FeeItem`]: Fees, margin and rewards of one order in one ring
//! - [`RingResult`] / [`BatchResult`]: Settlement outcomes
//! - [`SettlementReceipt`]: SSZ batch receipt with a state root
//!
//! ## Integer Arithmetic
//!
//! Amounts are arbitrary-precision unsigned integers ([`amount::Amount`])
//! and every division floors. Fractions are only produced for reporting,
//! as exact `rust_decimal::Decimal` values.

pub mod amount;
mod order;
mod receipt;
mod result;
mod ring;

pub use amount::Amount;
pub use order::{Address, FeeMode, FeeSelection, Order, OrderHash, TokenId};
pub use receipt::SettlementReceipt;
pub use result::{
    BatchReport, BatchResult, FeeItem, OrderReport, RingFailure, RingReport, RingResult,
    RingSettlement, RingStage, SettledOrder,
};
pub use ring::{OrderKey, Ring};
