/*
 * SPDX-FileCopyrightText: 2026 The blockrank contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Assembly of the working set of a block.
//!
//! A [`BlockState`] is built from the [messages](crate::message::Message)
//! destined to a block, which may arrive in any order. Rank records define
//! the nodes of the block; intra-block edges are collected by target, and
//! boundary contributions are summed by target. References to nodes that never
//! appear in a rank record are kept as they are and ignored by the
//! [solver](crate::solver::BlockSolver).

use crate::message::{Message, NodeRecord, RecordFormat};
use kahan::KahanSum;
use std::collections::HashMap;

/// The per-block working set of a round.
#[derive(Debug, Default)]
pub struct BlockState {
    nodes: HashMap<u64, NodeRecord>,
    in_edges: HashMap<u64, Vec<u64>>,
    boundary: HashMap<u64, KahanSum<f64>>,
    malformed: usize,
}

impl BlockState {
    /// Builds a block from a sequence of textual records.
    ///
    /// Malformed records are logged and dropped.
    pub fn from_records<S: AsRef<str>>(
        records: impl IntoIterator<Item = S>,
        format: &RecordFormat,
    ) -> Self {
        let mut block = Self::default();
        for record in records {
            let record = record.as_ref();
            if record.trim().is_empty() {
                continue;
            }
            match format.parse(record) {
                Ok(message) => block.push(message),
                Err(e) => {
                    log::warn!("Dropping record: {e}");
                    block.malformed += 1;
                }
            }
        }
        block
    }

    /// Adds a message to the block.
    pub fn push(&mut self, message: Message) {
        match message {
            Message::Rank { node, rank, edges } => {
                if let Some(old) = self
                    .nodes
                    .insert(node, NodeRecord { node, rank, edges })
                {
                    log::warn!(
                        "Duplicate rank record for node {node}: replacing rank {} with {rank}",
                        old.rank
                    );
                }
            }
            Message::IntraEdge { source, target } => {
                self.in_edges.entry(target).or_default().push(source);
            }
            Message::Boundary { target, value } => {
                *self.boundary.entry(target).or_insert_with(KahanSum::new) += value;
            }
        }
    }

    /// Returns the number of nodes of the block.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the block contains no node.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the rank record of a node, if the node belongs to the block.
    pub fn node(&self, node: u64) -> Option<&NodeRecord> {
        self.nodes.get(&node)
    }

    /// Returns an iterator over the rank records of the block, in no
    /// particular order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.values()
    }

    /// Returns the sources of the declared intra-block edges entering
    /// `node`, duplicates included.
    pub fn in_edges(&self, node: u64) -> &[u64] {
        self.in_edges.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the sum of the boundary contributions received by `node`.
    pub fn boundary(&self, node: u64) -> f64 {
        self.boundary.get(&node).map_or(0.0, |sum| sum.sum())
    }

    /// Returns the number of malformed records dropped while building the
    /// block.
    pub fn malformed(&self) -> usize {
        self.malformed
    }
}

impl Extend<Message> for BlockState {
    fn extend<T: IntoIterator<Item = Message>>(&mut self, iter: T) {
        for message in iter {
            self.push(message);
        }
    }
}

impl FromIterator<Message> for BlockState {
    fn from_iter<T: IntoIterator<Item = Message>>(iter: T) -> Self {
        let mut block = Self::default();
        block.extend(iter);
        block
    }
}
