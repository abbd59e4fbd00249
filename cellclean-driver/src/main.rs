// SPDX-License-Identifier: Apache-2.0

//! Command line driver for cleaning up transistor-level cell libraries.
//!
//! Commands are given like:
//!
//! ```text
//! cellclean-driver <global-options> <command> <command-args-and-options>
//! ```
//!
//! Commands are:
//!
//! - clean-up: Copies a source table and removes constant, redundant,
//!   isomorphic and non-minimal cells from the copy.
//! - cell-stats: Prints the transistor count histogram of a table.
//! - compare: Checks that every function of a table exists in a reference
//!   table.
//! - canon: Prints the canonical signature and orbit size of a netlist file.
//!
//! Sample usage:
//!
//! ```shell
//! $ cargo run -- --config=cellclean.toml clean-up
//! $ cargo run -- cell-stats --library=cells.json --table=CLEAN_LIB
//! $ cargo run -- canon nand2.sp
//! ```

mod canon;
mod cell_stats;
mod clean_up;
mod cleanup_config;
mod compare;
mod report_cli_error;

use clap::{Arg, ArgAction};
use cleanup_config::{load_config, CleanupConfig, DEFAULT_CONFIG_FILE};
use report_cli_error::{report_cli_error_and_exit, report_failure_and_exit};

trait AppExt {
    fn add_library_args(self) -> Self;
    fn add_reference_arg(self) -> Self;
}

impl AppExt for clap::Command {
    fn add_library_args(self) -> Self {
        (self as clap::Command)
            .arg(
                Arg::new("library")
                    .long("library")
                    .value_name("LIBRARY_JSON")
                    .help("Path to the cell library file")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("table")
                    .long("table")
                    .value_name("TABLE")
                    .help("Cell table to operate on")
                    .action(ArgAction::Set),
            )
    }

    fn add_reference_arg(self) -> Self {
        (self as clap::Command).arg(
            Arg::new("reference_table")
                .long("reference_table")
                .value_name("REFERENCE_TABLE")
                .help("Table whose functions the result must be a subset of")
                .action(ArgAction::Set),
        )
    }
}

fn find_config_path(matches: &clap::ArgMatches) -> Option<String> {
    if let Some(path) = matches.get_one::<String>("config") {
        return Some(path.to_string());
    }
    // Without a flag, fall back to a config in the current directory.
    let cwd_path = std::env::current_dir().ok()?.join(DEFAULT_CONFIG_FILE);
    if cwd_path.exists() {
        log::info!(
            "Using {} in current directory: {}",
            DEFAULT_CONFIG_FILE,
            cwd_path.display()
        );
        return Some(cwd_path.display().to_string());
    }
    None
}

fn main() {
    let _ = env_logger::try_init();

    log::info!(
        "cellclean-driver starting; version: {}",
        env!("CARGO_PKG_VERSION")
    );

    let matches = clap::Command::new("cellclean-driver")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Cleans up transistor-level standard-cell libraries")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("CONFIG")
                .help("Path to a cellclean.toml file")
                .action(ArgAction::Set),
        )
        .subcommand(clap::Command::new("version").about("Prints the version of the driver"))
        .subcommand(
            clap::Command::new("clean-up")
                .about("Copies the source table and removes redundant cells from the copy")
                .add_library_args()
                .add_reference_arg()
                .arg(
                    Arg::new("source_table")
                        .long("source_table")
                        .value_name("SOURCE_TABLE")
                        .help("Table to copy the cells from")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("workers")
                        .long("workers")
                        .value_name("WORKERS")
                        .help("Worker threads per parallel stage")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            clap::Command::new("cell-stats")
                .about("Prints the number of cells per transistor count")
                .add_library_args(),
        )
        .subcommand(
            clap::Command::new("compare")
                .about("Checks that a table's functions all exist in a reference table")
                .add_library_args()
                .add_reference_arg(),
        )
        .subcommand(
            clap::Command::new("canon")
                .about("Prints the canonical signature and orbit size of a netlist")
                .arg(
                    Arg::new("netlist_file")
                        .help("The netlist file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("print_orbit")
                        .long("print_orbit")
                        .value_name("COUNT")
                        .help("Print the first COUNT equivalent signatures instead")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                ),
        )
        .get_matches();

    let config: Option<CleanupConfig> = find_config_path(&matches).map(|path| {
        let details = [("path".to_string(), path.clone())];
        if !std::path::Path::new(&path).exists() {
            report_cli_error_and_exit("config file does not exist", None, &details);
        }
        match load_config(std::path::Path::new(&path)) {
            Ok(config) => config,
            Err(e) => report_cli_error_and_exit(&format!("{:#}", e), None, &details),
        }
    });

    let (subcommand, result) = match matches.subcommand() {
        Some(("clean-up", m)) => ("clean-up", clean_up::handle_clean_up(m, &config)),
        Some(("cell-stats", m)) => ("cell-stats", cell_stats::handle_cell_stats(m, &config)),
        Some(("compare", m)) => ("compare", compare::handle_compare(m, &config)),
        Some(("canon", m)) => ("canon", canon::handle_canon(m, &config)),
        Some(("version", _)) => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return;
        }
        _ => report_cli_error_and_exit("No valid subcommand provided.", None, &[]),
    };

    if let Err(e) = result {
        report_failure_and_exit(subcommand, &e);
    }
}
