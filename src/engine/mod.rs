//! Ring settlement engine.
//!
//! ## Design Principles
//!
//! 1. **Determinism**: same batch, same state, same oracle answers produce
//!    the same result, bit for bit
//! 2. **Integer Math**: arbitrary-precision amounts, floor division only
//! 3. **Pure Fold**: state is threaded explicitly, `(state, ring) -> (state', result)`
//! 4. **Failures Are Values**: a failing ring is reported, the batch carries on
//!
//! ## Pipeline
//!
//! - [`OrderValidator`]: per-order validity
//! - [`FillPropagator`]: consistent fills around the cycle
//! - [`FeeEngine`]: fees, margin, rewards and rebates
//! - [`RingEvaluator`]: runs the three above as a state machine
//! - [`BatchSettler`]: folds rings over [`crate::book::BatchState`]
//! - [`TransferPlanner`]: token movements of settled rings
//!
//! ## Concurrency
//!
//! One batch is strictly sequential. Oracles and verifiers are
//! `Send + Sync`, so independent namespaces can be settled on separate
//! threads, each with its own state.

pub mod balances;
pub mod evaluator;
pub mod fees;
pub mod propagator;
pub mod settler;
pub mod transfers;
pub mod validator;

pub use balances::{BalanceOracle, Spendable, StaticBalances, Unbounded};
pub use evaluator::{Participant, RingEvaluator};
pub use fees::{split_amount, FeeEngine};
pub use propagator::{FillPropagator, RingFills};
pub use settler::BatchSettler;
pub use transfers::{net_deltas, Transfer, TransferPlanner};
pub use validator::{AcceptAll, DigestVerifier, OrderValidator, SignatureVerifier};
