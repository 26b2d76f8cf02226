/*
 * SPDX-FileCopyrightText: 2026 The blockrank contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use blockrank::driver::RoundDriver;
use blockrank::message::{Message, NodeRecord};
use blockrank::partition::{Modulo, Ranges};
use blockrank::solver::{BlockSolver, ConfigError};
use dsi_progress_logger::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Returns the 𝓁-∞ distance (maximum absolute difference) between two vectors.
fn l_inf_distance(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// Builds a random graph in which every node has at least one successor.
fn random_graph(n: u64, max_degree: usize, seed: u64) -> Vec<NodeRecord> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n)
        .map(|node| {
            let degree = rng.random_range(1..=max_degree);
            NodeRecord {
                node,
                rank: 1.0 / n as f64,
                edges: Some((0..degree).map(|_| rng.random_range(0..n)).collect()),
            }
        })
        .collect()
}

/// Computes PageRank using the standard power method on a graph without
/// dangling nodes.
fn power_method(graph: &[NodeRecord], alpha: f64, iterations: usize) -> Vec<f64> {
    let n = graph.len();
    let mut rank = vec![1.0 / n as f64; n];
    for _ in 0..iterations {
        let mut next = vec![(1.0 - alpha) / n as f64; n];
        for record in graph {
            let edges = record.edges.as_ref().unwrap();
            let share = rank[record.node as usize] / edges.len() as f64;
            for &target in edges {
                next[target as usize] += alpha * share;
            }
        }
        rank = next;
    }
    rank
}

#[test]
fn test_scatter() {
    // 0 → 1 (same block), 0 → 2 (other block), 2 → 0 (other block),
    // 1 has unknown edges
    let records = vec![
        NodeRecord {
            node: 0,
            rank: 0.4,
            edges: Some(vec![1, 2]),
        },
        NodeRecord {
            node: 1,
            rank: 0.2,
            edges: None,
        },
        NodeRecord {
            node: 2,
            rank: 0.4,
            edges: Some(vec![0]),
        },
    ];
    let driver = RoundDriver::new(records, Ranges::new(vec![2, 3]).unwrap());
    let blocks = driver.scatter();
    assert_eq!(blocks.len(), 2);

    let first = &blocks[&0];
    assert_eq!(first.len(), 4);
    assert!(first.contains(&Message::IntraEdge {
        source: 0,
        target: 1
    }));
    assert!(first.contains(&Message::Boundary {
        target: 0,
        value: 0.4
    }));

    let second = &blocks[&1];
    assert_eq!(second.len(), 2);
    assert!(second.contains(&Message::Boundary {
        target: 2,
        value: 0.2
    }));
}

#[test]
fn test_blocked_vs_power_method() -> Result<()> {
    for &(n, num_blocks, seed) in &[(10, 1, 0u64), (100, 4, 1), (300, 7, 2)] {
        let graph = random_graph(n, 5, seed);
        for &alpha in &[0.25, 0.5, 0.85] {
            let expected = power_method(&graph, alpha, 500);

            let mut solver = BlockSolver::new(n as usize);
            solver.alpha(alpha).threshold(0.0);
            let mut driver = RoundDriver::new(graph.clone(), Modulo::new(num_blocks)?);
            driver.solver(solver).threshold(0.0).max_rounds(200);
            driver.run()?;

            let rank = driver
                .records()
                .iter()
                .map(|record| record.rank)
                .collect::<Vec<_>>();
            assert!(
                l_inf_distance(&expected, &rank) < 1E-9,
                "n={n} blocks={num_blocks} alpha={alpha}: L∞={}",
                l_inf_distance(&expected, &rank)
            );
            assert!((rank.iter().sum::<f64>() - 1.0).abs() < 1E-9);
        }
    }
    Ok(())
}

#[test]
fn test_round_cap() -> Result<()> {
    let graph = random_graph(50, 3, 3);
    let mut solver = BlockSolver::new(50);
    solver.max_iter(1).threshold(0.0);
    let mut driver = RoundDriver::new(graph, Modulo::new(5)?);
    driver.solver(solver).threshold(0.0).max_rounds(3);
    assert_eq!(driver.run()?, 3);
    assert_eq!(driver.rounds(), 3);
    assert!(driver.residual() > 0.0);
    Ok(())
}

#[test]
fn test_stops_on_global_residual() -> Result<()> {
    let graph = random_graph(100, 4, 4);
    let mut driver = RoundDriver::new(graph, Modulo::new(4)?);
    driver.threshold(1E-6).max_rounds(1000);
    let rounds = driver.run()?;
    assert!(rounds < 1000);
    assert!(driver.residual() <= 1E-6);
    Ok(())
}

#[test]
fn test_round_summary() -> Result<()> {
    let graph = random_graph(40, 3, 5);
    let mut driver = RoundDriver::new(graph, Modulo::new(4)?);
    let summary = driver.run_round()?;
    assert_eq!(summary.round, 1);
    assert_eq!(summary.blocks, 4);
    assert!(summary.max_local_iterations >= 1);
    assert!(summary.max_local_iterations <= 20);
    assert!((summary.residual - summary.counter as f64 / 1E8 / 40.0).abs() < 1E-15);
    assert_eq!(driver.records().len(), 40);
    assert!(driver.records().windows(2).all(|w| w[0].node < w[1].node));
    Ok(())
}

#[test]
fn test_dangling_targets_are_dropped() -> Result<()> {
    // Node 1 points to node 7, which does not exist
    let records = vec![
        NodeRecord {
            node: 0,
            rank: 0.5,
            edges: Some(vec![1]),
        },
        NodeRecord {
            node: 1,
            rank: 0.5,
            edges: Some(vec![0, 7]),
        },
    ];
    let mut driver = RoundDriver::new(records, Modulo::new(2)?);
    driver.run_round()?;
    let nodes = driver
        .records()
        .iter()
        .map(|record| record.node)
        .collect::<Vec<_>>();
    assert_eq!(nodes, vec![0, 1]);
    Ok(())
}

#[test]
fn test_invalid_configuration() -> Result<()> {
    let mut driver = RoundDriver::new(vec![], Modulo::new(1)?);
    assert_eq!(driver.run().unwrap_err(), ConfigError::ZeroNodes);

    let mut driver = RoundDriver::new(random_graph(5, 2, 6), Modulo::new(1)?);
    driver.max_rounds(0);
    assert_eq!(driver.run().unwrap_err(), ConfigError::ZeroIterations);

    let mut driver = RoundDriver::new(random_graph(5, 2, 6), Modulo::new(1)?);
    driver.scale(0.0);
    assert_eq!(driver.run().unwrap_err(), ConfigError::InvalidScale(0.0));
    assert_eq!(driver.run_round().unwrap_err(), ConfigError::InvalidScale(0.0));
    assert_eq!(driver.rounds(), 0);
    Ok(())
}

#[test]
fn test_run_with_logging() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let graph = random_graph(60, 3, 7);
    let mut driver = RoundDriver::new(graph, Ranges::new(vec![20, 40, 60])?);
    driver.max_rounds(4);
    let mut pl = ProgressLogger::default();
    pl.display_memory(true);
    let rounds = driver.run_with_logging(&mut pl)?;
    assert!((1..=4).contains(&rounds));
    assert_eq!(driver.rounds(), rounds);
    Ok(())
}

#[cfg_attr(feature = "slow_tests", test)]
#[cfg_attr(not(feature = "slow_tests"), allow(dead_code))]
fn test_large_blocked_vs_power_method() -> Result<()> {
    let n = 100_000;
    let graph = random_graph(n, 10, 8);
    let expected = power_method(&graph, 0.85, 300);

    let mut solver = BlockSolver::new(n as usize);
    solver.threshold(0.0);
    let mut driver = RoundDriver::new(graph, Modulo::new(64)?);
    driver.solver(solver).threshold(0.0).max_rounds(200);
    driver.run()?;

    let rank = driver
        .records()
        .iter()
        .map(|record| record.rank)
        .collect::<Vec<_>>();
    assert!(l_inf_distance(&expected, &rank) < 1E-9);
    Ok(())
}
