//! Running-peak drawdown tracking.
//!
//! The tracker owns the peak price seen so far and the index of the last tier
//! that fired during the current high-to-trough leg. A qualifying new high
//! clears that index so the tiers can be earned again on the next decline.

use serde::{Deserialize, Serialize};

use super::error::DcaError;

/// When a new running high clears the fired-tier index.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum NewHighReset {
    /// Every new high resets the tiers.
    #[default]
    Immediate,
    /// Only a new high more than `min_rally_pct` percent above the previous
    /// high resets the tiers.
    AfterRally { min_rally_pct: f64 },
}

impl NewHighReset {
    /// `0` (or less) means [`NewHighReset::Immediate`].
    pub fn from_rally_pct(pct: f64) -> Self {
        if pct > 0.0 {
            NewHighReset::AfterRally { min_rally_pct: pct }
        } else {
            NewHighReset::Immediate
        }
    }

    fn resets(&self, previous_high: f64, new_high: f64) -> bool {
        match *self {
            NewHighReset::Immediate => true,
            NewHighReset::AfterRally { min_rally_pct } => {
                (new_high - previous_high) / previous_high * 100.0 > min_rally_pct
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrawdownState {
    /// `None` until the first price (or a baseline) is observed.
    pub running_high: Option<f64>,
    pub current_drawdown_pct: f64,
    /// `None` means no tier has fired since the last reset.
    pub last_triggered_tier: Option<usize>,
}

/// Outcome of feeding one price to the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownUpdate {
    pub drawdown_pct: f64,
    pub new_high: bool,
    pub tiers_reset: bool,
}

#[derive(Debug, Clone)]
pub struct DrawdownTracker {
    state: DrawdownState,
    reset: NewHighReset,
}

impl DrawdownTracker {
    pub fn new(reset: NewHighReset) -> Self {
        DrawdownTracker {
            state: DrawdownState::default(),
            reset,
        }
    }

    /// Seed the running high before the first price. Non-positive or
    /// non-finite baselines are ignored.
    pub fn with_baseline(baseline_high: f64, reset: NewHighReset) -> Self {
        let mut tracker = Self::new(reset);
        if baseline_high.is_finite() && baseline_high > 0.0 {
            tracker.state.running_high = Some(baseline_high);
        }
        tracker
    }

    pub fn state(&self) -> &DrawdownState {
        &self.state
    }

    pub fn running_high(&self) -> Option<f64> {
        self.state.running_high
    }

    pub fn current_drawdown_pct(&self) -> f64 {
        self.state.current_drawdown_pct
    }

    pub fn last_triggered_tier(&self) -> Option<usize> {
        self.state.last_triggered_tier
    }

    /// Record that `tier` fired. The index only moves upward within a leg.
    pub fn mark_tier_fired(&mut self, tier: usize) {
        debug_assert!(self.state.last_triggered_tier.is_none_or(|last| tier > last));
        self.state.last_triggered_tier = Some(tier);
    }

    /// Feed the next price and return the drawdown percentage from the peak.
    pub fn update(&mut self, price: f64) -> Result<f64, DcaError> {
        self.observe(price).map(|u| u.drawdown_pct)
    }

    /// Like [`update`](Self::update) but also reports new-high and reset events.
    pub fn observe(&mut self, price: f64) -> Result<DrawdownUpdate, DcaError> {
        let previous_high = self.state.running_high;
        if !price.is_finite() || price <= 0.0 {
            return Err(DcaError::InvalidPrice {
                price,
                running_high: previous_high.unwrap_or(0.0),
            });
        }

        let mut new_high = false;
        let mut tiers_reset = false;
        let high = match previous_high {
            None => {
                self.state.running_high = Some(price);
                price
            }
            Some(high) if high <= 0.0 => {
                return Err(DcaError::InvalidPrice {
                    price,
                    running_high: high,
                });
            }
            Some(high) if price > high => {
                new_high = true;
                if self.reset.resets(high, price) {
                    tiers_reset = self.state.last_triggered_tier.is_some();
                    self.state.last_triggered_tier = None;
                }
                self.state.running_high = Some(price);
                price
            }
            Some(high) => high,
        };

        let drawdown_pct = ((high - price) / high * 100.0).max(0.0);
        self.state.current_drawdown_pct = drawdown_pct;

        Ok(DrawdownUpdate {
            drawdown_pct,
            new_high,
            tiers_reset,
        })
    }
}

impl Default for DrawdownTracker {
    fn default() -> Self {
        Self::new(NewHighReset::Immediate)
    }
}
