/*
 * SPDX-FileCopyrightText: 2026 The blockrank contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use blockrank::block::BlockState;
use blockrank::message::{Message, RecordFormat};

#[test]
fn test_boundary_order_independent() {
    let format = RecordFormat::default();
    let forward = BlockState::from_records(["PR\t7\t0.1", "BC\t7\t0.1", "BC\t7\t0.2"], &format);
    let backward = BlockState::from_records(["BC\t7\t0.2", "BC\t7\t0.1", "PR\t7\t0.1"], &format);
    assert_eq!(forward.boundary(7), backward.boundary(7));
    assert!((forward.boundary(7) - 0.3).abs() < 1E-15);
    assert_eq!(forward.boundary(8), 0.0);
}

#[test]
fn test_in_edges_keep_duplicates() {
    let block: BlockState = [
        Message::IntraEdge {
            source: 1,
            target: 2,
        },
        Message::IntraEdge {
            source: 3,
            target: 2,
        },
        Message::IntraEdge {
            source: 1,
            target: 2,
        },
    ]
    .into_iter()
    .collect();
    let mut sources = block.in_edges(2).to_vec();
    sources.sort();
    assert_eq!(sources, vec![1, 1, 3]);
    assert!(block.in_edges(1).is_empty());
    // Edges alone do not create nodes
    assert!(block.is_empty());
}

#[test]
fn test_malformed_records_are_dropped() {
    let format = RecordFormat::new('|').unwrap();
    let block = BlockState::from_records(
        [
            "PR|1|0.5|2",
            "PR|2|zero",
            "XYZ|1|2",
            "",
            "EDGE|1",
            "BC|2|0.125",
            "PR|2|0.5",
        ],
        &format,
    );
    assert_eq!(block.malformed(), 3);
    assert_eq!(block.num_nodes(), 2);
    assert_eq!(block.boundary(2), 0.125);
    assert_eq!(block.node(1).unwrap().edges, Some(vec![2]));
    assert_eq!(block.node(1).unwrap().outdegree(), 1);
    assert_eq!(block.node(2).unwrap().edges, None);
    assert_eq!(block.node(2).unwrap().outdegree(), 0);
}

#[test]
fn test_duplicate_rank_last_write_wins() {
    let block: BlockState = [
        Message::Rank {
            node: 4,
            rank: 0.1,
            edges: Some(vec![1, 2]),
        },
        Message::Rank {
            node: 4,
            rank: 0.2,
            edges: None,
        },
    ]
    .into_iter()
    .collect();
    assert_eq!(block.num_nodes(), 1);
    let node = block.node(4).unwrap();
    assert_eq!(node.rank, 0.2);
    assert_eq!(node.edges, None);
}

#[test]
fn test_message_records_round_trip_through_block() {
    let format = RecordFormat::default();
    let messages = vec![
        Message::Rank {
            node: 3,
            rank: 0.25,
            edges: Some(vec![4, 5]),
        },
        Message::IntraEdge {
            source: 3,
            target: 4,
        },
        Message::Boundary {
            target: 3,
            value: 0.5,
        },
    ];
    let records = messages
        .iter()
        .map(|message| format.format_message(message))
        .collect::<Vec<_>>();
    assert_eq!(records, vec!["PR\t3\t0.25\t4,5", "EDGE\t3\t4", "BC\t3\t0.5"]);

    let block = BlockState::from_records(&records, &format);
    assert_eq!(block.malformed(), 0);
    assert_eq!(block.in_edges(4), &[3]);
    assert_eq!(block.boundary(3), 0.5);
}
