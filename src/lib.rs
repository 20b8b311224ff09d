//! # Ring Settlement
//!
//! Off-chain reference model of order-ring settlement for a decentralized
//! exchange.
//!
//! ## Architecture
//!
//! - **Types**: orders, rings, fee items, results and receipts
//! - **Book**: slab-backed order arena and the batch state threaded across rings
//! - **Engine**: validation, fill propagation, fees, ring evaluation, batch
//!   settlement and transfer planning
//! - **Scenario**: JSON scenario loading and expectation checking
//!
//! ## Design Principles
//!
//! 1. **Determinism**: identical inputs produce identical results, bit for bit
//! 2. **No Floating Point**: arbitrary-precision integers with floor division;
//!    fractions are exact decimals used only for reporting
//! 3. **Explicit State**: order fill state is a value folded through the batch
//! 4. **Synchronous Execution**: no I/O and no async inside the engine
//!
//! ## Example
//!
//! ```
//! use ring_settlement::{Scenario, SettlementConfig};
//!
//! let scenario = Scenario::from_json(r#"{
//!     "rings": [[0, 1]],
//!     "orders": [
//!         { "tokenS": "X", "tokenB": "Y", "amountS": 100e18, "amountB": 10e18 },
//!         { "tokenS": "Y", "tokenB": "X", "amountS": 5e18, "amountB": 45e18 }
//!     ]
//! }"#).unwrap();
//!
//! let run = scenario.run(&SettlementConfig::simulation()).unwrap();
//! let ring = run.result.rings[0].settlement().unwrap();
//! assert_eq!(ring.orders[0].fees.margin.to_string(), "5000000000000000000");
//! ```

// ============================================================================
// Module declarations
// ============================================================================

/// Core data types: Order, Ring, FeeItem, results, receipts
pub mod types;

/// Order arena and batch state
pub mod book;

/// Settlement engine
pub mod engine;

/// Settlement configuration and context
pub mod config;

/// Error taxonomy
pub mod error;

/// JSON scenarios
pub mod scenario;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use book::{BatchState, OrderArena};
pub use config::{AllOrNoneScope, SettlementConfig, SettlementContext};
pub use engine::{BatchSettler, RingEvaluator, TransferPlanner};
pub use error::{FailureKind, ScenarioError, SettlementError};
pub use scenario::{Scenario, ScenarioExpectation};
pub use types::{Amount, BatchResult, FeeItem, FeeMode, Order, Ring, RingResult, SettlementReceipt};
