/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Tommaso Fontana
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::generate::{generate, GenerateOpts};
use anyhow::Result;
use clap::{ArgMatches, Args, Command, FromArgMatches};
use std::path::PathBuf;
use std::process::ExitCode;

pub const COMMAND_NAME: &str = "generate";

#[derive(Args, Debug)]
#[command(about = "Generates kabi information for the given kernel build.", long_about = None)]
struct CliArgs {
    /// Display debug information.
    #[arg(short, long)]
    verbose: bool,
    /// Where to write the kabi files.
    #[arg(short, long, default_value = "./output")]
    output: PathBuf,
    /// A file containing the list of symbols of interest (e.g. whitelisted).
    #[arg(short, long)]
    symbols: Option<PathBuf>,
    /// Replace this absolute path prefix by a relative path in recorded
    /// source locations.
    #[arg(short, long)]
    replace_path: Option<String>,
    /// Generate extra information (declaration stack, compilation unit).
    #[arg(short, long)]
    generate_extra_info: bool,
    /// The kernel modules to process: a directory tree of objects, or a
    /// single object file.
    kernel_dir: PathBuf,
}

pub fn cli(command: Command) -> Command {
    command.subcommand(CliArgs::augment_args(Command::new(COMMAND_NAME)))
}

pub fn main(submatches: &ArgMatches) -> Result<ExitCode> {
    let args = CliArgs::from_arg_matches(submatches)?;
    super::init_env_logger(args.verbose);

    let opts = GenerateOpts {
        kernel_dir: args.kernel_dir,
        kabi_dir: args.output,
        symbols: args.symbols,
        replace_path: args.replace_path,
        gen_extra: args.generate_extra_info,
    };
    generate(&opts)?;
    Ok(ExitCode::SUCCESS)
}
