/*
 * SPDX-FileCopyrightText: 2026 The blockrank contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::{FormatArgs, GlobalArgs, SolverArgs, open_input, open_output};
use anyhow::{Context, Result};
use blockrank::block::BlockState;
use blockrank::residual::ResidualAggregator;
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "block",
    about = "Solve a single block. The records of the block (PR, EDGE, and BC) are read from a file or from standard input, and one output record per node is written to a file or to standard output. The residual counter increment of the block is logged.",
    long_about = None
)]
pub struct CliArgs {
    /// The file containing the records of the block (standard input if
    /// missing or "-").
    pub input: Option<PathBuf>,

    #[arg(short, long)]
    /// Where to store the output records (standard output if missing).
    pub output: Option<PathBuf>,

    #[arg(short = 'n', long)]
    /// The number of nodes of the whole graph.
    pub num_nodes: usize,

    #[arg(long, default_value_t = ResidualAggregator::DEFAULT_SCALE)]
    /// The scale factor used to turn residuals into counter increments.
    pub scale: f64,

    #[clap(flatten)]
    pub solver: SolverArgs,

    #[clap(flatten)]
    pub format: FormatArgs,
}

pub fn main(_global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let aggregator = ResidualAggregator::new(args.scale)?;
    let format = args.format.to_format()?;
    let solver = args.solver.to_solver(args.num_nodes)?;

    let input = open_input(args.input.as_deref())?;
    let records = input
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .context("Could not read the records of the block")?;
    log::info!("Read {} records", records.len());

    let block = BlockState::from_records(&records, &format);
    if block.malformed() != 0 {
        log::warn!("Dropped {} malformed records", block.malformed());
    }

    let solution = solver.solve(&block)?;
    let increment = if block.is_empty() {
        0
    } else {
        aggregator.record(solution.residual)
    };

    let mut output = open_output(args.output.as_deref())?;
    for record in &solution.records {
        writeln!(output, "{}", format.format_output(record))
            .context("Could not write output record")?;
    }
    output.flush().context("Could not flush output")?;

    log::info!(
        "Solved {} nodes in {} iterations: residual = {}, drift = {}, counter increment = {}",
        block.num_nodes(),
        solution.iterations,
        solution.residual,
        solution.drift,
        increment
    );

    Ok(())
}
