/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Tommaso Fontana
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::objects::{debug_tree, hide_kabi, parse_record_file, print_tree, DisplayOpts};
use anyhow::Result;
use clap::{ArgMatches, Args, Command, FromArgMatches};
use std::path::PathBuf;
use std::process::ExitCode;

pub const COMMAND_NAME: &str = "show";

#[derive(Args, Debug)]
#[command(about = "Pretty-prints kabi files.", long_about = None)]
struct CliArgs {
    /// Print the raw trees.
    #[arg(short, long)]
    debug: bool,
    /// Hide changes made by RH_KABI_REPLACE().
    #[arg(short = 'k', long)]
    hide_kabi: bool,
    /// Hide the kabi trickery made by RH_KABI_REPLACE(), but show the new
    /// field.
    #[arg(short = 'n', long)]
    hide_kabi_new: bool,
    /// Don't display the offset of struct fields.
    #[arg(long)]
    no_offset: bool,
    /// The kabi files to show.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

pub fn cli(command: Command) -> Command {
    command.subcommand(CliArgs::augment_args(Command::new(COMMAND_NAME)))
}

pub fn main(submatches: &ArgMatches) -> Result<ExitCode> {
    let args = CliArgs::from_arg_matches(submatches)?;
    super::init_env_logger(false);

    let display = DisplayOpts {
        no_offset: args.no_offset,
    };
    let mut first = true;
    for file in &args.files {
        if !first {
            println!();
        }
        first = false;
        let mut record = parse_record_file(file)?;
        if args.hide_kabi || args.hide_kabi_new {
            hide_kabi(&mut record.obj, args.hide_kabi_new);
        }
        if args.debug {
            print!("{}", debug_tree(&record.obj));
        }
        print!("{}", print_tree(&record.obj, "", &display));
    }
    Ok(ExitCode::SUCCESS)
}
