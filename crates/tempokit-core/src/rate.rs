//! Stretch rate resolution
//!
//! Turns a tempo estimate and a [`TimeStretchConfig`] into concrete rate
//! bounds. Rate is dimensionless: output duration ≈ input duration / rate,
//! so a rate above 1.0 speeds the track up.

use crate::config::{StretchTarget, TimeStretchConfig};
use crate::error::{PipelineError, Result};

/// Resolved stretch rate bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateBounds {
    pub min: f64,
    pub max: f64,
}

impl RateBounds {
    /// Both bounds are exactly 1.0
    pub fn is_identity(&self) -> bool {
        self.min == 1.0 && self.max == 1.0
    }

    /// Tempo range these bounds produce from `tempo`, rounded to 2 decimals
    pub fn tempo_range(&self, tempo: f64) -> (f64, f64) {
        (round2(tempo * self.min), round2(tempo * self.max))
    }
}

/// Outcome of rate resolution for one source
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateDecision {
    /// Nothing to do; no output must be written
    NoOp,
    Stretch {
        min_rate: f64,
        max_rate: f64,
        /// Tempo reported in results and used for directory nesting
        target_tempo: f64,
    },
}

/// Round to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute rate bounds for an estimated tempo
///
/// A target tempo gives a fixed ratio `target / estimate` for both bounds. A
/// rate range is used as is; the effective target is the midpoint of the two
/// tempos it produces.
///
/// # Errors
/// `Computation` if the estimate isn't a positive finite number.
pub fn resolve_bounds(estimated_tempo: f64, config: &TimeStretchConfig) -> Result<(RateBounds, f64)> {
    if !estimated_tempo.is_finite() || estimated_tempo <= 0.0 {
        return Err(PipelineError::Computation(format!(
            "tempo estimate must be positive, got {}",
            estimated_tempo
        )));
    }

    let resolved = match config.stretch() {
        StretchTarget::Tempo(target) => {
            let rate = target / estimated_tempo;
            (RateBounds { min: rate, max: rate }, target)
        }
        StretchTarget::Rates { min, max } => {
            let bounds = RateBounds { min, max };
            let midpoint = (estimated_tempo * min + estimated_tempo * max) / 2.0;
            (bounds, round2(midpoint))
        }
    };

    if !resolved.0.min.is_finite() || !resolved.0.max.is_finite() {
        return Err(PipelineError::Computation(format!(
            "non-finite rate for tempo estimate {}",
            estimated_tempo
        )));
    }

    Ok(resolved)
}

/// Decide whether and how to stretch a source
pub fn resolve(estimated_tempo: f64, config: &TimeStretchConfig) -> Result<RateDecision> {
    let (bounds, target_tempo) = resolve_bounds(estimated_tempo, config)?;

    if bounds.is_identity() {
        return Ok(RateDecision::NoOp);
    }

    Ok(RateDecision::Stretch {
        min_rate: bounds.min,
        max_rate: bounds.max,
        target_tempo,
    })
}
