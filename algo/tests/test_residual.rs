/*
 * SPDX-FileCopyrightText: 2026 The blockrank contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use blockrank::block::BlockState;
use blockrank::message::Message;
use blockrank::residual::ResidualAggregator;
use blockrank::solver::{BlockSolver, ConfigError};
use rayon::prelude::*;

#[test]
fn test_encode_rounds() -> Result<()> {
    let aggregator = ResidualAggregator::new(100.0)?;
    assert_eq!(aggregator.encode(0.014), 1);
    assert_eq!(aggregator.encode(0.016), 2);
    assert_eq!(aggregator.encode(0.0), 0);
    assert_eq!(aggregator.encode(-1.0), 0);
    assert_eq!(aggregator.encode(f64::NAN), 0);
    Ok(())
}

#[test]
fn test_concurrent_increments() {
    let aggregator = ResidualAggregator::default();
    (0..1000)
        .into_par_iter()
        .for_each(|_| assert_eq!(aggregator.record(1E-3), 100_000));
    assert_eq!(aggregator.total(), 100_000_000);
    assert_eq!(aggregator.blocks(), 1000);
    // Divided by the scale and by the number of nodes, not of blocks
    assert!((aggregator.global_residual(10) - 0.1).abs() < 1E-12);
}

#[test]
fn test_reset() -> Result<()> {
    let aggregator = ResidualAggregator::new(10.0)?;
    aggregator.record(0.5);
    assert_eq!(aggregator.total(), 5);
    aggregator.reset();
    assert_eq!(aggregator.total(), 0);
    assert_eq!(aggregator.blocks(), 0);
    assert_eq!(aggregator.global_residual(3), 0.0);
    Ok(())
}

#[test]
fn test_invalid_scale() {
    for scale in [0.0, -1.0, f64::INFINITY, f64::NAN] {
        assert!(matches!(
            ResidualAggregator::new(scale),
            Err(ConfigError::InvalidScale(_))
        ));
    }
}

#[test]
fn test_total_saturates() -> Result<()> {
    // With α = 1 a rank collapsing from 1 to a tiny boundary value has a huge
    // relative change
    let block: BlockState = [
        Message::Rank {
            node: 0,
            rank: 1.0,
            edges: None,
        },
        Message::Boundary {
            target: 0,
            value: 1E-300,
        },
    ]
    .into_iter()
    .collect();
    let mut solver = BlockSolver::new(1);
    solver.alpha(1.0).max_iter(1);
    let solution = solver.solve(&block)?;
    assert!(solution.residual > 1E299);

    let aggregator = ResidualAggregator::default();
    assert_eq!(aggregator.record(solution.residual), u64::MAX);
    assert_eq!(aggregator.record(solution.residual), u64::MAX);
    assert_eq!(aggregator.record(2E-8), 2);
    assert_eq!(aggregator.total(), u64::MAX);
    assert_eq!(aggregator.blocks(), 3);
    assert!(aggregator.global_residual(2) > 1E10);
    Ok(())
}
