//! Fill propagation around a ring.
//!
//! ## Algorithm
//!
//! 1. **Capacity**: each order can sell `min(amount_s - filled_s, spendable_s)`.
//!    Buy-limited orders derive the sell bound from the remaining buy amount
//!    with `floor(remaining_b * amount_s / amount_b)`. A zero sell or buy
//!    capacity fails the ring.
//! 2. **Seed** `fill_s[i]` with that capacity.
//! 3. **Clamp**: order `i` buys from order `i + 1`, so it cannot buy more than
//!    `i + 1` delivers after its tokenS percentage fee. When
//!    `floor(fill_s[i] * amount_b[i] / amount_s[i]) > post_fee(fill_s[i + 1])`
//!    the buyer is reduced to `fill_s[i] = floor(post_fee(fill_s[i + 1]) *
//!    amount_s[i] / amount_b[i])`. Limits travel from seller to buyer, so the
//!    walk goes against the token flow: `n-1, n-2, .., 0`. The first pass
//!    records the last limiting order; the second pass starts there and walks
//!    one full loop. A confirmation pass repeats until nothing changes, which
//!    only takes extra rounds when floor rounding compounds around the loop.
//!    Fills that keep shrinking mean the prices, net of percentage fees,
//!    cannot close the loop, and the ring fails.
//! 4. **Finalize**: `fill_b[i] = floor(fill_s[i] * amount_b[i] / amount_s[i])`.
//!    A zero `fill_b`, or a rounding error above the configured tolerance,
//!    fails the ring.
//!
//! Every value only ever shrinks, so the result is the largest consistent
//! fill below the capacities.

use num_traits::Zero;
use tracing::trace;

use crate::config::SettlementConfig;
use crate::engine::balances::{clamp_to, saturating_sub, Spendable};
use crate::engine::Participant;
use crate::error::SettlementError;
use crate::types::amount::{mul_div, scale};
use crate::types::Amount;

/// Passes allowed after the two main passes before giving up
const MAX_SETTLE_PASSES: usize = 16;

/// Converged fill amounts of a ring, indexed by ring position
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RingFills {
    /// tokenS each order gives up (fee and margin included)
    pub fill_s: Vec<Amount>,
    /// tokenB each order buys, before any tokenB fee
    pub fill_b: Vec<Amount>,
}

/// Computes mutually consistent fills for a ring
pub struct FillPropagator<'a> {
    config: &'a SettlementConfig,
}

impl<'a> FillPropagator<'a> {
    pub fn new(config: &'a SettlementConfig) -> Self {
        Self { config }
    }

    /// Compute the fills of the ring formed by `participants`
    pub fn compute_fills(
        &self,
        participants: &[Participant<'_>],
        spendable: &Spendable<'_>,
    ) -> Result<RingFills, SettlementError> {
        let n = participants.len();
        let mut fill_s = Vec::with_capacity(n);
        for (i, p) in participants.iter().enumerate() {
            fill_s.push(self.capacity(i, p, spendable)?);
        }

        let mut smallest = None;
        for i in (0..n).rev() {
            if self.limit(participants, &mut fill_s, i) {
                smallest = Some((i + 1) % n);
            }
        }
        trace!(?smallest, "first propagation pass");

        if let Some(start) = smallest {
            for step in 0..n {
                let i = (start + n - step) % n;
                self.limit(participants, &mut fill_s, i);
            }
        }

        let mut passes = 0;
        loop {
            let mut clamped = None;
            for i in (0..n).rev() {
                if self.limit(participants, &mut fill_s, i) {
                    clamped = Some(i);
                }
            }
            let Some(index) = clamped else { break };
            passes += 1;
            trace!(passes, index, "fills still shrinking");
            if passes >= MAX_SETTLE_PASSES {
                // Rates (after percentage fees) do not close the loop
                return Err(SettlementError::PriceNotMet { index });
            }
        }

        self.finalize(participants, fill_s)
    }

    /// Sell capacity of one order
    fn capacity(
        &self,
        index: usize,
        p: &Participant<'_>,
        spendable: &Spendable<'_>,
    ) -> Result<Amount, SettlementError> {
        let order = p.order;
        let spendable_s = spendable.order(&p.hash, &order.token_s);
        let remaining_s = saturating_sub(&order.amount_s, &p.fill.filled_s);

        let available_s = if order.buy_no_more_than_amount_b {
            let remaining_b = saturating_sub(&order.amount_b, &p.fill.filled_b);
            let from_b = mul_div(&remaining_b, &order.amount_s, &order.amount_b);
            clamp_to(clamp_to(from_b, Some(&remaining_s)), spendable_s.as_ref())
        } else {
            clamp_to(remaining_s, spendable_s.as_ref())
        };
        let available_b = mul_div(&available_s, &order.amount_b, &order.amount_s);

        if available_s.is_zero() || available_b.is_zero() {
            return Err(SettlementError::ZeroFill { index });
        }
        Ok(available_s)
    }

    /// tokenS order `i` actually delivers after its percentage fee
    fn post_fee_s(&self, p: &Participant<'_>, fill_s: &Amount) -> Amount {
        let bps = p.order.token_s_fee_bps();
        if bps == 0 {
            return fill_s.clone();
        }
        fill_s - scale(fill_s, bps, self.config.fee_percentage_base)
    }

    /// Reduce order `i` to what order `i + 1` delivers. Returns whether
    /// anything changed.
    fn limit(&self, participants: &[Participant<'_>], fill_s: &mut [Amount], i: usize) -> bool {
        let n = participants.len();
        let next = (i + 1) % n;
        let delivered = self.post_fee_s(&participants[next], &fill_s[next]);

        let order = participants[i].order;
        let wanted = mul_div(&fill_s[i], &order.amount_b, &order.amount_s);
        if wanted > delivered {
            fill_s[i] = mul_div(&delivered, &order.amount_s, &order.amount_b);
            true
        } else {
            false
        }
    }

    fn finalize(
        &self,
        participants: &[Participant<'_>],
        fill_s: Vec<Amount>,
    ) -> Result<RingFills, SettlementError> {
        let tolerance = Amount::from(self.config.rounding_tolerance_bps);
        let bps_base = Amount::from(10_000u32);

        let mut fill_b = Vec::with_capacity(fill_s.len());
        for (i, (p, s)) in participants.iter().zip(&fill_s).enumerate() {
            let order = p.order;
            if s.is_zero() {
                return Err(SettlementError::ZeroFill { index: i });
            }
            let exact = s * &order.amount_b;
            let b = &exact / &order.amount_s;
            if b.is_zero() {
                return Err(SettlementError::Dust { index: i });
            }
            let remainder = &exact % &order.amount_s;
            if remainder * &bps_base > &tolerance * &exact {
                return Err(SettlementError::RoundingError { index: i });
            }
            fill_b.push(b);
        }

        Ok(RingFills { fill_s, fill_b })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
