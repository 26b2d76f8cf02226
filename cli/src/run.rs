/*
 * SPDX-FileCopyrightText: 2026 The blockrank contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::{
    ArcsArgs, FormatArgs, GlobalArgs, NumThreadsArg, SolverArgs, get_thread_pool, open_input,
    open_output,
};
use anyhow::{Context, Result, bail, ensure};
use blockrank::driver::RoundDriver;
use blockrank::message::{NodeRecord, RecordFormat};
use blockrank::partition::{Modulo, Partition, Ranges};
use blockrank::residual::ResidualAggregator;
use clap::Parser;
use dsi_progress_logger::prelude::*;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "run",
    about = "Run blocked PageRank in process. Reads a list of arcs, one per line, with numerical node identifiers, assigns to every node the initial rank 1/n, partitions the nodes into blocks, and runs rounds until the global residual falls below a threshold or the maximum number of rounds is reached. One output record per node is written at the end.",
    long_about = None
)]
pub struct CliArgs {
    /// The file containing the arcs of the graph (standard input if "-").
    pub arcs: PathBuf,

    #[arg(short, long)]
    /// Where to store the output records.
    pub output: PathBuf,

    #[arg(long)]
    /// The number of nodes of the graph; if not specified, the number of
    /// distinct node identifiers appearing in arcs is used.
    pub num_nodes: Option<usize>,

    #[arg(long, conflicts_with("blocks"))]
    /// The number of blocks; node x is assigned to block x mod the number of
    /// blocks.
    pub num_blocks: Option<u64>,

    #[arg(long, conflicts_with("num_blocks"))]
    /// A file containing the strictly increasing exclusive upper bounds of
    /// contiguous blocks of node identifiers, one per line.
    pub blocks: Option<PathBuf>,

    #[arg(long, default_value_t = RoundDriver::<Modulo>::DEFAULT_MAX_ROUNDS)]
    /// Maximum number of rounds.
    pub rounds: usize,

    #[arg(long, default_value_t = RoundDriver::<Modulo>::DEFAULT_THRESHOLD)]
    /// The global residual threshold to stop running rounds.
    pub round_threshold: f64,

    #[arg(long, default_value_t = ResidualAggregator::DEFAULT_SCALE)]
    /// The scale factor used to turn block residuals into counter increments.
    pub scale: f64,

    #[clap(flatten)]
    pub arcs_args: ArcsArgs,

    #[clap(flatten)]
    pub solver: SolverArgs,

    #[clap(flatten)]
    pub format: FormatArgs,

    #[clap(flatten)]
    pub num_threads: NumThreadsArg,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    ResidualAggregator::new(args.scale)?;
    ensure!(args.rounds > 0, "The number of rounds must be positive");
    let format = args.format.to_format()?;

    let records = read_arcs(&args.arcs, &args.arcs_args)?;
    let num_nodes = args.num_nodes.unwrap_or(records.len());
    ensure!(
        num_nodes >= records.len(),
        "The number of nodes ({num_nodes}) is smaller than the number of distinct nodes in arcs ({})",
        records.len()
    );
    log::info!(
        "Read {} nodes with {} arcs",
        records.len(),
        records.iter().map(NodeRecord::outdegree).sum::<usize>()
    );

    let records = records
        .into_iter()
        .map(|mut record| {
            record.rank = 1.0 / num_nodes as f64;
            record
        })
        .collect::<Vec<_>>();

    match &args.blocks {
        Some(path) => {
            let ranges = Ranges::new(read_bounds(path)?)?;
            log::info!("Using {} contiguous blocks", ranges.num_blocks());
            run(global_args, &args, format, num_nodes, records, ranges)
        }
        None => {
            let num_blocks = args.num_blocks.unwrap_or(1);
            log::info!("Using {num_blocks} blocks by residue");
            run(
                global_args,
                &args,
                format,
                num_nodes,
                records,
                Modulo::new(num_blocks)?,
            )
        }
    }
}

fn run<P: Partition + Send>(
    global_args: GlobalArgs,
    args: &CliArgs,
    format: RecordFormat,
    num_nodes: usize,
    records: Vec<NodeRecord>,
    partition: P,
) -> Result<()> {
    let mut pl = ProgressLogger::default();
    pl.display_memory(true);
    if let Some(log_interval) = global_args.log_interval {
        pl.log_interval(log_interval);
    }

    let thread_pool = get_thread_pool(args.num_threads.num_threads)?;

    let mut driver = RoundDriver::new(records, partition);
    driver
        .solver(args.solver.to_solver(num_nodes)?)
        .max_rounds(args.rounds)
        .threshold(args.round_threshold)
        .scale(args.scale);

    let rounds = thread_pool.install(|| driver.run_with_logging(&mut pl))?;
    log::info!(
        "Completed after {} round(s), residual = {}",
        rounds,
        driver.residual()
    );

    let mut output = open_output(Some(&args.output))?;
    for record in driver.records() {
        writeln!(output, "{}", format.format_output(record))
            .with_context(|| format!("Could not write to {}", args.output.display()))?;
    }
    output
        .flush()
        .with_context(|| format!("Could not write to {}", args.output.display()))?;

    Ok(())
}

/// Reads an arc list, returning one record per node, sorted by node, with
/// zero rank.
///
/// Nodes appearing only as targets get an empty edge list.
fn read_arcs(path: &Path, arcs_args: &ArcsArgs) -> Result<Vec<NodeRecord>> {
    let input = open_input(Some(path))?;
    let biggest_idx = arcs_args.source_column.max(arcs_args.target_column);
    let mut successors = BTreeMap::<u64, Vec<u64>>::new();

    for (line_num, line) in input.lines().enumerate() {
        let line = line.with_context(|| format!("Could not read line {}", line_num + 1))?;
        // skip comments and empty lines
        if line.trim().is_empty() || line.trim().starts_with(arcs_args.line_comment_symbol) {
            continue;
        }

        let vals = line.split(arcs_args.separator).collect::<Vec<_>>();
        if vals.get(biggest_idx).is_none() {
            log::warn!(
                "Line {}: {:?} does not have enough columns: got {} columns but expected at least {} columns separated by {:?} (you can change the separator using the --separator option)",
                line_num + 1,
                line,
                vals.len(),
                biggest_idx + 1,
                arcs_args.separator,
            );
            continue;
        }

        let parse = |val: &str| {
            val.trim().parse::<u64>().with_context(|| {
                format!(
                    "Error parsing as integer node {:?} at line {}",
                    val,
                    line_num + 1
                )
            })
        };
        let src = parse(vals[arcs_args.source_column])?;
        let dst = parse(vals[arcs_args.target_column])?;

        successors.entry(src).or_default().push(dst);
        successors.entry(dst).or_default();
    }

    Ok(successors
        .into_iter()
        .map(|(node, edges)| NodeRecord {
            node,
            rank: 0.0,
            edges: Some(edges),
        })
        .collect())
}

/// Reads the upper bounds of contiguous blocks, one per line.
fn read_bounds(path: &Path) -> Result<Vec<u64>> {
    let input = open_input(Some(path))?;
    let mut bounds = Vec::new();
    for (line_num, line) in input.lines().enumerate() {
        let line = line.with_context(|| format!("Could not read {}", path.display()))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<u64>() {
            Ok(bound) => bounds.push(bound),
            Err(e) => bail!(
                "Error parsing block bound {:?} at line {} of {}: {}",
                line,
                line_num + 1,
                path.display(),
                e
            ),
        }
    }
    Ok(bounds)
}
