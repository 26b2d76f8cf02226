/*
 * SPDX-FileCopyrightText: 2026 The blockrank contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Deterministic assignment of nodes to blocks.

use thiserror::Error;

/// A deterministic function from nodes to blocks.
pub trait Partition: Sync {
    /// Returns the block of a node.
    fn block_of(&self, node: u64) -> u64;
}

impl<P: Partition + ?Sized> Partition for &P {
    fn block_of(&self, node: u64) -> u64 {
        (**self).block_of(node)
    }
}

/// Errors raised when building a partition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("The number of blocks must be positive")]
    NoBlocks,
    #[error("Block bounds must be strictly increasing: {prev} >= {next} at index {index}")]
    Unsorted { index: usize, prev: u64, next: u64 },
}

/// Assigns node *x* to block *x* mod *k*.
#[derive(Debug, Clone, Copy)]
pub struct Modulo {
    num_blocks: u64,
}

impl Modulo {
    pub fn new(num_blocks: u64) -> Result<Self, PartitionError> {
        if num_blocks == 0 {
            return Err(PartitionError::NoBlocks);
        }
        Ok(Self { num_blocks })
    }
}

impl Partition for Modulo {
    fn block_of(&self, node: u64) -> u64 {
        node % self.num_blocks
    }
}

/// Assigns nodes to blocks of contiguous identifiers.
///
/// Block *b* contains the nodes in [*u*_(*b* − 1) . . *u*_*b*), where *u*₀, *u*₁,
/// … are the given upper bounds (and *u*₋₁ = 0). Nodes beyond the last bound
/// belong to the last block.
///
/// # Examples
///
/// ```
/// use blockrank::partition::{Partition, Ranges};
///
/// let ranges = Ranges::new(vec![10, 20, 30]).unwrap();
/// assert_eq!(ranges.block_of(0), 0);
/// assert_eq!(ranges.block_of(10), 1);
/// assert_eq!(ranges.block_of(29), 2);
/// assert_eq!(ranges.block_of(100), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Ranges {
    upper_bounds: Box<[u64]>,
}

impl Ranges {
    pub fn new(upper_bounds: Vec<u64>) -> Result<Self, PartitionError> {
        if upper_bounds.is_empty() {
            return Err(PartitionError::NoBlocks);
        }
        for (index, pair) in upper_bounds.windows(2).enumerate() {
            if pair[0] >= pair[1] {
                return Err(PartitionError::Unsorted {
                    index: index + 1,
                    prev: pair[0],
                    next: pair[1],
                });
            }
        }
        Ok(Self {
            upper_bounds: upper_bounds.into_boxed_slice(),
        })
    }

    /// Returns the number of blocks.
    pub fn num_blocks(&self) -> usize {
        self.upper_bounds.len()
    }
}

impl Partition for Ranges {
    fn block_of(&self, node: u64) -> u64 {
        let block = self.upper_bounds.partition_point(|&bound| bound <= node);
        block.min(self.upper_bounds.len() - 1) as u64
    }
}
