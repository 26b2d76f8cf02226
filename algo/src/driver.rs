/*
 * SPDX-FileCopyrightText: 2026 The blockrank contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! In-process driver for blocked PageRank rounds.
//!
//! Each round has two stages, mirroring a map/reduce job:
//!
//! 1. _scatter_: every node sends its rank record to its own block; each of
//!    its out-edges becomes an intra-block edge message if the target lives in
//!    the same block, and a boundary contribution of rank / outdegree to the
//!    target's block otherwise;
//! 2. _solve_: every block is assembled from its messages and
//!    [solved](crate::solver::BlockSolver) independently, in parallel, each
//!    block adding its residual to a shared
//!    [`ResidualAggregator`](crate::residual::ResidualAggregator).
//!
//! The records emitted by the blocks are the input of the next round. Rounds
//! stop when the global residual falls to or below a threshold, or after a
//! maximum number of rounds.

use crate::block::BlockState;
use crate::message::{Message, NodeRecord};
use crate::partition::Partition;
use crate::residual::ResidualAggregator;
use crate::solver::{BlockSolver, ConfigError, preds};
use dsi_progress_logger::{ProgressLog, no_logging};
use predicates::prelude::*;
use rayon::prelude::*;
use std::collections::HashMap;

/// Statistics about a completed round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundSummary {
    /// The index of the round, starting from one.
    pub round: usize,
    /// The number of blocks that received at least one message.
    pub blocks: usize,
    /// The value of the residual counter at the end of the round.
    pub counter: u64,
    /// The global residual of the round.
    pub residual: f64,
    /// The largest number of local iterations performed by a block.
    pub max_local_iterations: usize,
}

/// Runs blocked PageRank rounds on an in-memory graph.
///
/// # Examples
///
/// ```
/// use blockrank::driver::RoundDriver;
/// use blockrank::message::NodeRecord;
/// use blockrank::partition::Modulo;
///
/// // A directed 4-cycle split into two blocks
/// let records = (0..4)
///     .map(|node| NodeRecord {
///         node,
///         rank: 0.25,
///         edges: Some(vec![(node + 1) % 4]),
///     })
///     .collect();
///
/// let mut driver = RoundDriver::new(records, Modulo::new(2).unwrap());
/// driver.run().unwrap();
///
/// for record in driver.records() {
///     assert!((record.rank - 0.25).abs() < 1E-9);
/// }
/// ```
#[derive(Debug)]
pub struct RoundDriver<P: Partition> {
    records: Vec<NodeRecord>,
    partition: P,
    solver: BlockSolver,
    max_rounds: usize,
    threshold: f64,
    scale: f64,
    round: usize,
    residual: f64,
}

impl<P: Partition> RoundDriver<P> {
    pub const DEFAULT_MAX_ROUNDS: usize = 5;
    pub const DEFAULT_THRESHOLD: f64 = 1E-3;

    /// Creates a new driver.
    ///
    /// The solver is initialized with default parameters and with the number
    /// of records as number of nodes of the graph.
    pub fn new(records: Vec<NodeRecord>, partition: P) -> Self {
        let solver = BlockSolver::new(records.len());
        Self {
            records,
            partition,
            solver,
            max_rounds: Self::DEFAULT_MAX_ROUNDS,
            threshold: Self::DEFAULT_THRESHOLD,
            scale: ResidualAggregator::DEFAULT_SCALE,
            round: 0,
            residual: f64::INFINITY,
        }
    }

    /// Sets the solver used for blocks.
    pub fn solver(&mut self, solver: BlockSolver) -> &mut Self {
        self.solver = solver;
        self
    }

    /// Sets the maximum number of rounds.
    pub fn max_rounds(&mut self, max_rounds: usize) -> &mut Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Sets the global residual threshold below which rounds stop.
    pub fn threshold(&mut self, threshold: f64) -> &mut Self {
        self.threshold = threshold;
        self
    }

    /// Sets the scale factor of the residual counter.
    ///
    /// The scale factor is checked when running rounds.
    pub fn scale(&mut self, scale: f64) -> &mut Self {
        self.scale = scale;
        self
    }

    /// Returns the current node records, sorted by node id after the first
    /// round.
    pub fn records(&self) -> &[NodeRecord] {
        &self.records
    }

    /// Consumes the driver, returning the current node records.
    pub fn into_records(self) -> Vec<NodeRecord> {
        self.records
    }

    /// Returns the number of rounds performed.
    pub fn rounds(&self) -> usize {
        self.round
    }

    /// Returns the global residual of the last round.
    pub fn residual(&self) -> f64 {
        self.residual
    }

    /// Routes the messages generated by the current records to their blocks.
    pub fn scatter(&self) -> HashMap<u64, Vec<Message>> {
        self.records
            .par_iter()
            .fold(
                HashMap::<u64, Vec<Message>>::new,
                |mut blocks, record| {
                    let block = self.partition.block_of(record.node);
                    if let Some(edges) = record.edges.as_ref().filter(|e| !e.is_empty()) {
                        let share = record.rank / edges.len() as f64;
                        for &target in edges {
                            let target_block = self.partition.block_of(target);
                            if target_block == block {
                                blocks.entry(block).or_default().push(Message::IntraEdge {
                                    source: record.node,
                                    target,
                                });
                            } else {
                                blocks
                                    .entry(target_block)
                                    .or_default()
                                    .push(Message::Boundary {
                                        target,
                                        value: share,
                                    });
                            }
                        }
                    }
                    blocks
                        .entry(block)
                        .or_default()
                        .push(Message::from(record.clone()));
                    blocks
                },
            )
            .reduce(HashMap::new, |mut blocks0, blocks1| {
                for (block, mut messages) in blocks1 {
                    blocks0.entry(block).or_default().append(&mut messages);
                }
                blocks0
            })
    }

    /// Runs a single round.
    pub fn run_round(&mut self) -> Result<RoundSummary, ConfigError> {
        self.solver.validate()?;
        let aggregator = ResidualAggregator::new(self.scale)?;

        let blocks = self.scatter().into_iter().collect::<Vec<_>>();
        let num_blocks = blocks.len();

        let solver = self.solver;
        let aggregator = &aggregator;

        let solutions = blocks
            .into_par_iter()
            .map(|(block, messages)| {
                let state = messages.into_iter().collect::<BlockState>();
                let solution = solver.solve(&state)?;
                if !state.is_empty() {
                    let increment = aggregator.record(solution.residual);
                    log::debug!(
                        "Block {block}: {} nodes, {} iterations, residual = {}, drift = {}, counter += {increment}",
                        state.num_nodes(),
                        solution.iterations,
                        solution.residual,
                        solution.drift,
                    );
                }
                Ok(solution)
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let max_local_iterations = solutions
            .iter()
            .map(|solution| solution.iterations)
            .max()
            .unwrap_or(0);
        let mut records = solutions
            .into_iter()
            .flat_map(|solution| solution.records)
            .collect::<Vec<_>>();
        records.par_sort_unstable_by_key(|record| record.node);
        self.records = records;

        self.round += 1;
        self.residual = aggregator.global_residual(solver.graph_nodes());

        let summary = RoundSummary {
            round: self.round,
            blocks: num_blocks,
            counter: aggregator.total(),
            residual: self.residual,
            max_local_iterations,
        };
        log::info!(
            "Round {}: {} blocks, counter = {}, residual = {}",
            summary.round,
            summary.blocks,
            summary.counter,
            summary.residual
        );
        Ok(summary)
    }

    /// Runs rounds until the global residual falls to or below the threshold
    /// or the maximum number of rounds is reached.
    pub fn run(&mut self) -> Result<usize, ConfigError> {
        self.run_with_logging(no_logging![])
    }

    /// Runs rounds as [`run`](Self::run), logging progress on `pl`.
    ///
    /// Returns the number of rounds performed by this call.
    pub fn run_with_logging(&mut self, pl: &mut impl ProgressLog) -> Result<usize, ConfigError> {
        if self.max_rounds == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        let predicate = preds::Residual::try_from(self.threshold)
            .map_err(|_| ConfigError::InvalidThreshold(self.threshold))?
            .or(preds::MaxIter::from(self.max_rounds));
        self.solver.validate()?;
        ResidualAggregator::new(self.scale)?;

        log::info!("Nodes: {}", self.solver.graph_nodes());
        log::info!("Stopping criterion: {}", predicate);

        pl.item_name("round");
        pl.expected_updates(Some(self.max_rounds));
        pl.start("Running blocked PageRank...");

        let mut rounds = 0;
        loop {
            let summary = self.run_round()?;
            rounds += 1;
            pl.update_and_display();

            if predicate.eval(&preds::PredParams {
                iteration: rounds,
                residual: summary.residual,
            }) {
                break;
            }
        }

        pl.done();
        Ok(rounds)
    }
}
