//! Order storage and the state threaded across rings.
//!
//! ## Components
//!
//! - [`OrderArena`]: slab-backed order storage; rings refer to its keys
//! - [`BatchState`]: filled amounts and balance consumption, keyed by order
//!   hash, threaded through the batch fold
//!
//! ## Example
//!
//! ```
//! use ring_settlement::book::{BatchState, OrderArena};
//! use ring_settlement::types::{Amount, Order};
//!
//! let mut arena = OrderArena::with_capacity(8);
//! let key = arena.insert(Order::new("alice", "A", "B", Amount::from(3u32), Amount::from(1u32)));
//!
//! let state = BatchState::new();
//! let hash = arena.slot(key).unwrap().hash;
//! assert_eq!(state.filled_s(&hash), Amount::from(0u32));
//! ```

pub mod arena;
pub mod state;

pub use arena::{OrderArena, OrderSlot};
pub use state::{BatchState, OrderFillState};
