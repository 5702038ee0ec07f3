/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Tommaso Fontana
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::compare::{compare, CompareOpts};
use crate::objects::DisplayOpts;
use crate::EXIT_KABI_CHANGE;
use anyhow::Result;
use clap::{ArgMatches, Args, Command, FromArgMatches};
use std::path::PathBuf;
use std::process::ExitCode;

pub const COMMAND_NAME: &str = "compare";

#[derive(Args, Debug)]
#[command(about = "Compares two kabi dumps and reports ABI differences.", long_about = None)]
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
    /// Show only the first version of a symbol when several exist.
    #[arg(short, long)]
    skip_duplicate: bool,
    /// Follow referenced symbols.
    #[arg(long)]
    follow: bool,
    /// Don't display the offset of struct fields.
    #[arg(long)]
    no_offset: bool,
    /// Hide replaced symbols (symbols that changed, but haven't moved).
    #[arg(long)]
    no_replaced: bool,
    /// Hide shifted symbols (symbols that haven't changed, but whose offset
    /// did).
    #[arg(long)]
    no_shifted: bool,
    /// Hide symbols inserted in the middle of a struct, union...
    #[arg(long)]
    no_inserted: bool,
    /// Hide symbols removed from the middle of a struct, union...
    #[arg(long)]
    no_deleted: bool,
    /// Hide symbols added at the end of a struct, union...
    #[arg(long)]
    no_added: bool,
    /// Hide symbols removed from the end of a struct, union...
    #[arg(long)]
    no_removed: bool,
    /// Hide changes caused by a symbol definition moving to another file.
    /// Warning: it also hides symbols that are removed entirely.
    #[arg(long)]
    no_moved_files: bool,
    /// The old kabi dir (or a single kabi file).
    old: PathBuf,
    /// The new kabi dir (or a single kabi file).
    new: PathBuf,
    /// Compare only these paths, relative to the kabi dirs.
    files: Vec<String>,
}

pub fn cli(command: Command) -> Command {
    command.subcommand(CliArgs::augment_args(Command::new(COMMAND_NAME)))
}

pub fn main(submatches: &ArgMatches) -> Result<ExitCode> {
    let args = CliArgs::from_arg_matches(submatches)?;
    super::init_env_logger(false);

    let opts = CompareOpts {
        debug: args.debug,
        hide_kabi: args.hide_kabi || args.hide_kabi_new,
        hide_kabi_new: args.hide_kabi_new,
        skip_duplicate: args.skip_duplicate,
        follow: args.follow,
        no_replaced: args.no_replaced,
        no_shifted: args.no_shifted,
        no_inserted: args.no_inserted,
        no_deleted: args.no_deleted,
        no_added: args.no_added,
        no_removed: args.no_removed,
        no_moved_files: args.no_moved_files,
        display: DisplayOpts {
            no_offset: args.no_offset,
        },
    };
    if compare(&opts, &args.old, &args.new, &args.files)? {
        Ok(ExitCode::from(EXIT_KABI_CHANGE))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
