//! Subjective Logic opinions

use serde::{Deserialize, Serialize};
use skillgraph_common::errors::{AppError, Result};
use std::cmp::Ordering;

/// Allowed drift of `b + d + u` from 1
pub const TOLERANCE: f64 = 1e-9;

/// Binomial opinion (belief, disbelief, uncertainty, base rate)
///
/// Invariant: `b + d + u = 1` and every component lies in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Opinion {
    pub belief: f64,
    pub disbelief: f64,
    pub uncertainty: f64,
    pub base_rate: f64,
}

impl Opinion {
    /// Validated constructor
    pub fn new(belief: f64, disbelief: f64, uncertainty: f64, base_rate: f64) -> Result<Self> {
        let in_range = |v: f64| v.is_finite() && (-TOLERANCE..=1.0 + TOLERANCE).contains(&v);
        if ![belief, disbelief, uncertainty, base_rate].into_iter().all(in_range) {
            return Err(AppError::Validation {
                message: format!(
                    "opinion components out of range: b={} d={} u={} a={}",
                    belief, disbelief, uncertainty, base_rate
                ),
                field: Some("opinion".to_string()),
            });
        }
        if (belief + disbelief + uncertainty - 1.0).abs() > TOLERANCE {
            return Err(AppError::Validation {
                message: format!(
                    "opinion masses sum to {} instead of 1",
                    belief + disbelief + uncertainty
                ),
                field: Some("opinion".to_string()),
            });
        }
        Ok(Self::clamped(belief, disbelief, uncertainty, base_rate))
    }

    /// No evidence at all: (0, 0, 1)
    pub fn vacuous(base_rate: f64) -> Self {
        Self {
            belief: 0.0,
            disbelief: 0.0,
            uncertainty: 1.0,
            base_rate,
        }
    }

    /// Build from masses already known to sum to 1, absorbing rounding noise
    pub(crate) fn clamped(belief: f64, disbelief: f64, uncertainty: f64, base_rate: f64) -> Self {
        Self {
            belief: belief.clamp(0.0, 1.0),
            disbelief: disbelief.clamp(0.0, 1.0),
            uncertainty: uncertainty.clamp(0.0, 1.0),
            base_rate: base_rate.clamp(0.0, 1.0),
        }
    }

    /// `b + u·a`
    pub fn plausibility(&self) -> f64 {
        self.belief + self.uncertainty * self.base_rate
    }

    pub fn is_vacuous(&self) -> bool {
        self.belief == 0.0 && self.disbelief == 0.0 && self.uncertainty == 1.0
    }

    /// Trust discounting: this opinion as reported through a source held
    /// with opinion `trust`.
    pub fn discount(&self, trust: &Opinion) -> Opinion {
        let b = trust.belief * self.belief;
        let d = trust.belief * self.disbelief;
        let u = trust.disbelief + trust.uncertainty + trust.belief * self.uncertainty;
        Opinion::clamped(b, d, u, self.base_rate)
    }

    /// Total order used to canonicalise fusion input
    pub(crate) fn canonical_cmp(&self, other: &Opinion) -> Ordering {
        self.belief
            .total_cmp(&other.belief)
            .then_with(|| self.disbelief.total_cmp(&other.disbelief))
            .then_with(|| self.uncertainty.total_cmp(&other.uncertainty))
            .then_with(|| self.base_rate.total_cmp(&other.base_rate))
    }
}
