/*
 * SPDX-FileCopyrightText: 2026 The blockrank contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Round-wide aggregation of block residuals.
//!
//! Distributed execution frameworks typically expose only integer counters to
//! the job driver. Each block thus contributes its residual scaled by a
//! constant factor and rounded, and at the end of the round the driver turns
//! the total back into a global residual.

use crate::solver::ConfigError;
use std::sync::atomic::{AtomicU64, Ordering};

/// An accumulating counter of scaled block residuals.
///
/// Increments are atomic additions, so blocks can contribute concurrently and
/// in any order. The total saturates at [`u64::MAX`] instead of wrapping.
///
/// # Examples
///
/// ```
/// use blockrank::residual::ResidualAggregator;
///
/// let aggregator = ResidualAggregator::new(1E6).unwrap();
/// aggregator.record(0.25);
/// aggregator.record(0.5);
/// assert_eq!(aggregator.total(), 750_000);
/// assert_eq!(aggregator.blocks(), 2);
/// assert!((aggregator.global_residual(3) - 0.25).abs() < 1E-12);
/// ```
#[derive(Debug)]
pub struct ResidualAggregator {
    scale: f64,
    total: AtomicU64,
    blocks: AtomicU64,
}

impl ResidualAggregator {
    pub const DEFAULT_SCALE: f64 = 1E8;

    /// Creates a new aggregator with the given scale factor, which must be
    /// positive and finite.
    pub fn new(scale: f64) -> Result<Self, ConfigError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(ConfigError::InvalidScale(scale));
        }
        Ok(Self {
            scale,
            total: AtomicU64::new(0),
            blocks: AtomicU64::new(0),
        })
    }

    /// Returns the scale factor.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Adds the contribution of a block and returns the increment.
    pub fn record(&self, residual: f64) -> u64 {
        let increment = self.encode(residual);
        // The closure always returns Some, so the update cannot fail
        let _ = self
            .total
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |total| {
                Some(total.saturating_add(increment))
            });
        self.blocks.fetch_add(1, Ordering::Relaxed);
        increment
    }

    /// Returns the integer increment corresponding to a residual.
    ///
    /// Negative and NaN residuals map to zero.
    pub fn encode(&self, residual: f64) -> u64 {
        // Float-to-int casts saturate
        (residual * self.scale).round() as u64
    }

    /// Returns the sum of the increments recorded so far.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Returns the number of blocks that contributed so far.
    pub fn blocks(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }

    /// Clears the counters at the start of a round.
    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.blocks.store(0, Ordering::Relaxed);
    }

    /// Returns the global residual, that is, the total divided by the scale
    /// factor and by the number of nodes of the graph.
    pub fn global_residual(&self, num_nodes: usize) -> f64 {
        self.total() as f64 / self.scale / num_nodes.max(1) as f64
    }
}

impl Default for ResidualAggregator {
    fn default() -> Self {
        Self {
            scale: Self::DEFAULT_SCALE,
            total: AtomicU64::new(0),
            blocks: AtomicU64::new(0),
        }
    }
}
