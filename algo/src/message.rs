/*
 * SPDX-FileCopyrightText: 2026 The blockrank contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Messages received by a block and their textual record format.
//!
//! A block receives an unordered stream of records, each of one of three
//! kinds, distinguished by a leading tag:
//!
//! - `PR<d>node<d>rank[<d>edges]`: the current rank of a node of the block,
//!   optionally followed by its comma-separated out-edge targets;
//! - `EDGE<d>source<d>target`: an arc between two nodes of the block;
//! - `BC<d>target<d>value`: rank mass flowing into `target` from a node of
//!   another block.
//!
//! Here `<d>` is the delimiter of the [`RecordFormat`], which must be
//! different from the comma separating edge targets.
//!
//! The output of a block is one record per node, `node<d>rank<d>edges`, which
//! is also the shape of a `PR` record without its tag.

use itertools::Itertools;
use thiserror::Error;

/// The tag of a rank record.
pub const RANK_TAG: &str = "PR";
/// The tag of an intra-block edge record.
pub const EDGE_TAG: &str = "EDGE";
/// The tag of a boundary-contribution record.
pub const BOUNDARY_TAG: &str = "BC";

/// A message received by a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// The current rank of a node of the block, with its out-edges if known.
    Rank {
        node: u64,
        rank: f64,
        edges: Option<Vec<u64>>,
    },
    /// An arc `source` → `target` with both endpoints in the block.
    IntraEdge { source: u64, target: u64 },
    /// Rank mass flowing into `target` from another block.
    Boundary { target: u64, value: f64 },
}

/// A node together with its rank and out-edges, as emitted by a block.
///
/// The same structure is the input of the next round.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub node: u64,
    pub rank: f64,
    pub edges: Option<Vec<u64>>,
}

impl NodeRecord {
    /// Returns the outdegree of the node, or zero if its edges are unknown.
    pub fn outdegree(&self) -> usize {
        self.edges.as_ref().map_or(0, Vec::len)
    }
}

impl From<NodeRecord> for Message {
    fn from(record: NodeRecord) -> Self {
        Message::Rank {
            node: record.node,
            rank: record.rank,
            edges: record.edges,
        }
    }
}

/// Errors raised when a record cannot be classified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The record does not start with a known tag.
    #[error("Unknown tag {tag:?} in record {record:?}")]
    UnknownTag { tag: String, record: String },

    /// The record has the wrong number of fields for its tag.
    #[error("Record {record:?} has {found} fields, expected {expected}")]
    WrongArity {
        record: String,
        found: usize,
        expected: &'static str,
    },

    /// A node identifier is not a valid unsigned integer.
    #[error("Invalid node id {0:?}")]
    BadNodeId(String),

    /// A rank or contribution is not a finite floating-point number.
    #[error("Invalid value {0:?}")]
    BadValue(String),

    /// A rank or contribution is negative.
    #[error("Negative value {0:?}")]
    NegativeValue(String),
}

/// Errors raised when building a [`RecordFormat`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The delimiter clashes with the edge-list separator or the line
    /// terminator.
    #[error("Invalid delimiter {0:?}: it must differ from ',' and from line terminators")]
    Delimiter(char),
}

/// The textual format of input and output records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordFormat {
    delimiter: char,
}

impl RecordFormat {
    pub const DEFAULT_DELIMITER: char = '\t';

    /// Creates a new format with the given field delimiter.
    pub fn new(delimiter: char) -> Result<Self, FormatError> {
        if delimiter == ',' || delimiter == '\n' || delimiter == '\r' {
            return Err(FormatError::Delimiter(delimiter));
        }
        Ok(Self { delimiter })
    }

    /// Returns the field delimiter.
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Classifies a record.
    pub fn parse(&self, record: &str) -> Result<Message, ParseError> {
        let record = record.trim_end_matches(['\n', '\r']);
        let fields = record.split(self.delimiter).collect::<Vec<_>>();
        let arity = |expected| ParseError::WrongArity {
            record: record.to_owned(),
            found: fields.len(),
            expected,
        };

        match fields[0] {
            RANK_TAG => {
                if !(3..=4).contains(&fields.len()) {
                    return Err(arity("3 or 4"));
                }
                let edges = match fields.get(3) {
                    Some(csv) if !csv.trim().is_empty() => Some(parse_edges(csv)?),
                    _ => None,
                };
                Ok(Message::Rank {
                    node: parse_node(fields[1])?,
                    rank: parse_value(fields[2])?,
                    edges,
                })
            }
            EDGE_TAG => {
                if fields.len() != 3 {
                    return Err(arity("3"));
                }
                Ok(Message::IntraEdge {
                    source: parse_node(fields[1])?,
                    target: parse_node(fields[2])?,
                })
            }
            BOUNDARY_TAG => {
                if fields.len() != 3 {
                    return Err(arity("3"));
                }
                Ok(Message::Boundary {
                    target: parse_node(fields[1])?,
                    value: parse_value(fields[2])?,
                })
            }
            tag => Err(ParseError::UnknownTag {
                tag: tag.to_owned(),
                record: record.to_owned(),
            }),
        }
    }

    /// Renders a message as an input record.
    pub fn format_message(&self, message: &Message) -> String {
        let d = self.delimiter;
        match message {
            Message::Rank {
                node,
                rank,
                edges: Some(edges),
            } => format!("{RANK_TAG}{d}{node}{d}{rank}{d}{}", edges.iter().join(",")),
            Message::Rank {
                node,
                rank,
                edges: None,
            } => format!("{RANK_TAG}{d}{node}{d}{rank}"),
            Message::IntraEdge { source, target } => format!("{EDGE_TAG}{d}{source}{d}{target}"),
            Message::Boundary { target, value } => format!("{BOUNDARY_TAG}{d}{target}{d}{value}"),
        }
    }

    /// Renders the output record of a node.
    ///
    /// If the edges of the node are unknown the last field is omitted; an
    /// empty edge list is rendered as an empty last field.
    pub fn format_output(&self, record: &NodeRecord) -> String {
        let d = self.delimiter;
        match &record.edges {
            Some(edges) => format!(
                "{}{d}{}{d}{}",
                record.node,
                record.rank,
                edges.iter().join(",")
            ),
            None => format!("{}{d}{}", record.node, record.rank),
        }
    }

    /// Parses an output record, that is, a record as produced by
    /// [`format_output`](Self::format_output).
    ///
    /// A missing edge field yields no edge list, whereas an empty edge field
    /// yields an empty edge list, so that every output record parses back to
    /// the record it was written from.
    pub fn parse_output(&self, record: &str) -> Result<NodeRecord, ParseError> {
        let record = record.trim_end_matches(['\n', '\r']);
        let fields = record.split(self.delimiter).collect::<Vec<_>>();
        if !(2..=3).contains(&fields.len()) {
            return Err(ParseError::WrongArity {
                record: record.to_owned(),
                found: fields.len(),
                expected: "2 or 3",
            });
        }
        let edges = match fields.get(2) {
            Some(csv) if csv.trim().is_empty() => Some(vec![]),
            Some(csv) => Some(parse_edges(csv)?),
            None => None,
        };
        Ok(NodeRecord {
            node: parse_node(fields[0])?,
            rank: parse_value(fields[1])?,
            edges,
        })
    }
}

impl Default for RecordFormat {
    fn default() -> Self {
        Self {
            delimiter: Self::DEFAULT_DELIMITER,
        }
    }
}

fn parse_node(field: &str) -> Result<u64, ParseError> {
    field
        .trim()
        .parse()
        .map_err(|_| ParseError::BadNodeId(field.to_owned()))
}

fn parse_value(field: &str) -> Result<f64, ParseError> {
    let value: f64 = field
        .trim()
        .parse()
        .map_err(|_| ParseError::BadValue(field.to_owned()))?;
    if !value.is_finite() {
        return Err(ParseError::BadValue(field.to_owned()));
    }
    if value < 0.0 {
        return Err(ParseError::NegativeValue(field.to_owned()));
    }
    Ok(value)
}

fn parse_edges(csv: &str) -> Result<Vec<u64>, ParseError> {
    csv.split(',').map(parse_node).collect()
}
