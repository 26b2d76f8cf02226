/*
 * SPDX-FileCopyrightText: 2026 The blockrank contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
#![deny(unreachable_pub)]
#![deny(unused_doc_comments)]

pub mod block;
pub mod driver;
pub mod message;
pub mod partition;
pub mod residual;
pub mod solver;

pub mod prelude {
    pub use crate::block::BlockState;
    pub use crate::driver::{RoundDriver, RoundSummary};
    pub use crate::message::{Message, NodeRecord, ParseError, RecordFormat};
    pub use crate::partition::{Modulo, Partition, Ranges};
    pub use crate::residual::ResidualAggregator;
    pub use crate::solver::{BlockSolution, BlockSolver, ConfigError, preds};
}
