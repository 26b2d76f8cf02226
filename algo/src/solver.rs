/*
 * SPDX-FileCopyrightText: 2026 The blockrank contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Block-local Jacobi PageRank.
//!
//! In blocked PageRank the nodes of a graph are partitioned into blocks, and
//! each outer round of the computation processes every block independently.
//! Within a block we iterate locally several times before the results are
//! shuffled back out, so that each (expensive) distributed round does as much
//! work as possible.
//!
//! # The formula
//!
//! Let *B* be the set of nodes of a block, α the damping factor and *N* the
//! number of nodes of the _whole_ graph. For a node *i* ∈ *B*, let *bᵢ* be the
//! sum of the boundary contributions it received from other blocks (computed
//! by the previous round and constant during the local iteration), and let
//! *dⱼ* be the outdegree of *j*. A local iteration computes
//!
//! > *xᵢ*⁽*ᵗ* ⁺ ¹⁾ = α ( ∑_(*j* → *i*, *j* ∈ *B*) *xⱼ*⁽*ᵗ*⁾ / *dⱼ*  +  *bᵢ* )  +  (1 − α) / *N*
//!
//! for all *i* ∈ *B* at the same time: this is a Jacobi iteration, and every
//! update of iteration *t* + 1 reads only values of iteration *t*. The
//! implementation keeps two rank vectors and swaps them after each iteration.
//!
//! Sources whose rank record is missing from the block, and sources whose
//! edges are unknown (and thus have no outdegree), contribute nothing.
//!
//! # The residual
//!
//! After each iteration we compute the _residual_, that is, the mean over the
//! nodes of the block of the relative change
//!
//! > | *xᵢ*⁽*ᵗ* ⁺ ¹⁾ − *xᵢ*⁽*ᵗ*⁾ | / *xᵢ*⁽*ᵗ* ⁺ ¹⁾,
//!
//! where the relative change of a node whose new rank is zero is zero. The
//! residual of a block is the residual of its _last_ iteration, and it is
//! what the block contributes to the
//! [`ResidualAggregator`](crate::residual::ResidualAggregator).
//!
//! # Stopping Criteria
//!
//! The local iteration stops as soon as the composable [`Predicate`]
//! [`Residual`](preds::Residual) `or` [`MaxIter`](preds::MaxIter) holds. The
//! same predicates are used by the [round driver](crate::driver::RoundDriver)
//! on the global residual.

pub mod preds {
    //! Predicates implementing stopping conditions.
    //!
    //! The predicates evaluate to true if the computation should be stopped.
    //! You can combine them using the `and` and `or` methods provided by the
    //! [`Predicate`] trait.
    //!
    //! # Examples
    //! ```
    //! # fn main() -> Result<(), Box<dyn std::error::Error>> {
    //! use predicates::prelude::*;
    //! use blockrank::solver::preds::{MaxIter, PredParams, Residual};
    //!
    //! let predicate = Residual::try_from(1E-3)?.or(MaxIter::from(20));
    //! assert!(predicate.eval(&PredParams { iteration: 20, residual: 1.0 }));
    //! assert!(predicate.eval(&PredParams { iteration: 1, residual: 1E-4 }));
    //! assert!(!predicate.eval(&PredParams { iteration: 1, residual: 1.0 }));
    //! #     Ok(())
    //! # }
    //! ```

    use anyhow::ensure;
    use predicates::{Predicate, reflection::PredicateReflection};
    use std::fmt::Display;

    /// This structure is passed to stopping predicates to provide the
    /// information that is needed to evaluate them.
    #[derive(Debug, Clone, Copy)]
    pub struct PredParams {
        /// The number of iterations (or rounds) performed so far.
        pub iteration: usize,
        /// The residual of the last iteration.
        pub residual: f64,
    }

    /// Stops after at most the provided number of iterations.
    #[derive(Debug, Clone)]
    pub struct MaxIter {
        max_iter: usize,
    }

    impl MaxIter {
        pub const DEFAULT_MAX_ITER: usize = 20;
    }

    impl From<usize> for MaxIter {
        fn from(max_iter: usize) -> Self {
            MaxIter { max_iter }
        }
    }

    impl Default for MaxIter {
        fn default() -> Self {
            Self::from(Self::DEFAULT_MAX_ITER)
        }
    }

    impl Display for MaxIter {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_fmt(format_args!("(max iter: {})", self.max_iter))
        }
    }

    impl PredicateReflection for MaxIter {}

    impl Predicate<PredParams> for MaxIter {
        fn eval(&self, pred_params: &PredParams) -> bool {
            pred_params.iteration >= self.max_iter
        }
    }

    /// Stops when the residual falls to or below a given threshold.
    ///
    /// A threshold of zero is accepted: it is reached only if an iteration
    /// leaves all ranks unchanged.
    #[derive(Debug, Clone)]
    pub struct Residual {
        threshold: f64,
    }

    impl Residual {
        pub const DEFAULT_THRESHOLD: f64 = 1E-3;
    }

    impl TryFrom<Option<f64>> for Residual {
        type Error = anyhow::Error;
        fn try_from(threshold: Option<f64>) -> anyhow::Result<Self> {
            Ok(match threshold {
                Some(threshold) => {
                    ensure!(!threshold.is_nan(), "The threshold must be a number");
                    ensure!(threshold >= 0.0, "The threshold must be nonnegative");
                    Residual { threshold }
                }
                None => Self::default(),
            })
        }
    }

    impl TryFrom<f64> for Residual {
        type Error = anyhow::Error;
        fn try_from(threshold: f64) -> anyhow::Result<Self> {
            Some(threshold).try_into()
        }
    }

    impl Default for Residual {
        fn default() -> Self {
            Residual {
                threshold: Self::DEFAULT_THRESHOLD,
            }
        }
    }

    impl Display for Residual {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_fmt(format_args!("(residual: {})", self.threshold))
        }
    }

    impl PredicateReflection for Residual {}

    impl Predicate<PredParams> for Residual {
        fn eval(&self, pred_params: &PredParams) -> bool {
            pred_params.residual <= self.threshold
        }
    }
}

use crate::block::BlockState;
use crate::message::NodeRecord;
use kahan::KahanSum;
use predicates::prelude::*;
use std::collections::HashMap;
use thiserror::Error;

/// Invalid solver configurations.
///
/// These are the only errors that abort the solution of a block.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// The number of nodes of the whole graph is zero.
    #[error("The number of nodes of the graph must be positive")]
    ZeroNodes,
    /// The damping factor is not in [0 . . 1].
    #[error("The damping factor must be in [0 . . 1], got {0}")]
    DampingOutOfRange(f64),
    /// The residual threshold is negative or NaN.
    #[error("The residual threshold must be a nonnegative number, got {0}")]
    InvalidThreshold(f64),
    /// The iteration cap is zero.
    #[error("The maximum number of iterations must be positive")]
    ZeroIterations,
    /// The scale factor of the residual counter is not positive and finite.
    #[error("The scale factor must be positive and finite, got {0}")]
    InvalidScale(f64),
}

/// The result of the solution of a block.
#[derive(Debug, Clone, Default)]
pub struct BlockSolution {
    /// The nodes of the block with their new rank, sorted by node id.
    pub records: Vec<NodeRecord>,
    /// The residual of the last iteration (zero for an empty block).
    pub residual: f64,
    /// The number of local iterations performed.
    pub iterations: usize,
    /// The mean relative change between the ranks the block received and
    /// the ranks it emits.
    pub drift: f64,
}

/// Solves a block by local Jacobi iteration.
///
/// The solver is configured via setters and then applied to any number of
/// blocks via [`solve`](Self::solve). The configuration is validated when
/// solving, so that an invalid configuration is reported as a
/// [`ConfigError`].
///
/// # Examples
///
/// ```
/// use blockrank::block::BlockState;
/// use blockrank::message::Message;
/// use blockrank::solver::BlockSolver;
///
/// // Two nodes 0 → 1 of a graph with two nodes, and some mass
/// // entering node 1 from another block
/// let block: BlockState = [
///     Message::Rank { node: 0, rank: 0.5, edges: Some(vec![1]) },
///     Message::Rank { node: 1, rank: 0.5, edges: None },
///     Message::IntraEdge { source: 0, target: 1 },
///     Message::Boundary { target: 1, value: 0.05 },
/// ]
/// .into_iter()
/// .collect();
///
/// let mut solver = BlockSolver::new(2);
/// solver.max_iter(1);
/// let solution = solver.solve(&block).unwrap();
///
/// assert_eq!(solution.iterations, 1);
/// assert!((solution.records[1].rank - 0.5425).abs() < 1E-12);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BlockSolver {
    alpha: f64,
    num_nodes: usize,
    max_iter: usize,
    threshold: f64,
}

impl BlockSolver {
    pub const DEFAULT_ALPHA: f64 = 0.85;

    /// Creates a new solver for blocks of a graph with `num_nodes` nodes.
    pub fn new(num_nodes: usize) -> Self {
        Self {
            alpha: Self::DEFAULT_ALPHA,
            num_nodes,
            max_iter: preds::MaxIter::DEFAULT_MAX_ITER,
            threshold: preds::Residual::DEFAULT_THRESHOLD,
        }
    }

    /// Sets the damping factor α.
    pub fn alpha(&mut self, alpha: f64) -> &mut Self {
        self.alpha = alpha;
        self
    }

    /// Sets the number of nodes of the whole graph.
    pub fn num_nodes(&mut self, num_nodes: usize) -> &mut Self {
        self.num_nodes = num_nodes;
        self
    }

    /// Sets the maximum number of local iterations.
    pub fn max_iter(&mut self, max_iter: usize) -> &mut Self {
        self.max_iter = max_iter;
        self
    }

    /// Sets the residual threshold below which the local iteration stops.
    pub fn threshold(&mut self, threshold: f64) -> &mut Self {
        self.threshold = threshold;
        self
    }

    /// Returns the number of nodes of the whole graph.
    pub fn graph_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Checks the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_nodes == 0 {
            return Err(ConfigError::ZeroNodes);
        }
        // Note that 0.0..=1.0 is [0.0..1.0] in mathematical notation
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigError::DampingOutOfRange(self.alpha));
        }
        if self.threshold.is_nan() || self.threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        if self.max_iter == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        Ok(())
    }

    /// Solves a block.
    ///
    /// An empty block yields an empty solution with zero residual and no
    /// iterations.
    pub fn solve(&self, block: &BlockState) -> Result<BlockSolution, ConfigError> {
        self.validate()?;
        if block.is_empty() {
            return Ok(BlockSolution::default());
        }

        let predicate = preds::Residual::try_from(self.threshold)
            .map_err(|_| ConfigError::InvalidThreshold(self.threshold))?
            .or(preds::MaxIter::from(self.max_iter));

        let mut nodes = block.nodes().collect::<Vec<_>>();
        nodes.sort_unstable_by_key(|record| record.node);
        let n = nodes.len();
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, record)| (record.node, i))
            .collect::<HashMap<_, _>>();

        let inv_outdegrees = nodes
            .iter()
            .map(|record| match record.outdegree() {
                0 => 0.0,
                d => 1.0 / d as f64,
            })
            .collect::<Box<[f64]>>();
        let boundary = nodes
            .iter()
            .map(|record| block.boundary(record.node))
            .collect::<Box<[f64]>>();

        // Predecessors as indices; unknown sources are dropped
        let mut skipped = 0;
        let mut preds_of = Vec::with_capacity(n);
        for record in &nodes {
            let mut preds_i = Vec::new();
            for source in block.in_edges(record.node) {
                match index.get(source) {
                    Some(&j) => preds_i.push(j),
                    None => {
                        log::trace!(
                            "Skipping edge {source} -> {}: unknown source",
                            record.node
                        );
                        skipped += 1;
                    }
                }
            }
            preds_of.push(preds_i);
        }
        if skipped != 0 {
            log::debug!("Skipped {skipped} intra-block edges with unknown source");
        }

        let floor = (1.0 - self.alpha) / self.num_nodes as f64;
        let mut prev = nodes
            .iter()
            .map(|record| record.rank)
            .collect::<Box<[f64]>>();
        let mut next = vec![0.0; n].into_boxed_slice();
        let mut iteration = 0;
        let mut residual;

        loop {
            let mut change: KahanSum<f64> = KahanSum::new();
            for (i, preds_i) in preds_of.iter().enumerate() {
                let mut sigma: KahanSum<f64> = KahanSum::new();
                for &j in preds_i {
                    sigma += prev[j] * inv_outdegrees[j];
                }
                sigma += boundary[i];

                let new_rank = sigma.sum() * self.alpha + floor;
                change += relative_change(prev[i], new_rank);
                next[i] = new_rank;
            }

            std::mem::swap(&mut prev, &mut next);
            iteration += 1;
            residual = change.sum() / n as f64;

            log::debug!("Local iteration {iteration}: residual = {residual}");

            if predicate.eval(&preds::PredParams {
                iteration,
                residual,
            }) {
                break;
            }
        }

        let mut drift: KahanSum<f64> = KahanSum::new();
        for (record, &rank) in nodes.iter().zip(prev.iter()) {
            drift += relative_change(record.rank, rank);
        }

        let records = nodes
            .into_iter()
            .zip(prev.iter())
            .map(|(record, &rank)| NodeRecord {
                node: record.node,
                rank,
                edges: record.edges.clone(),
            })
            .collect();

        Ok(BlockSolution {
            records,
            residual,
            iterations: iteration,
            drift: drift.sum() / n as f64,
        })
    }
}

/// Returns |`new` − `old`| / `new`, or zero if `new` is zero.
fn relative_change(old: f64, new: f64) -> f64 {
    if new == 0.0 {
        0.0
    } else {
        (new - old).abs() / new
    }
}
