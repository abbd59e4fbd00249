// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use cellclean::cell_stats::{format_histogram, transistor_histogram};
use cellclean::storage::{CellStore, MemoryStore};

use crate::cleanup_config::{get_library, get_table, CleanupConfig};

pub fn handle_cell_stats(
    matches: &clap::ArgMatches,
    config: &Option<CleanupConfig>,
) -> anyhow::Result<()> {
    let library = get_library(matches, config)?;
    let table = get_table(matches, config)?;
    let store = MemoryStore::open(Path::new(&library))?;
    let histogram = transistor_histogram(&store, &table)?;
    println!("{}: {} cell(s)", table, store.count(&table)?);
    print!("{}", format_histogram(&histogram));
    Ok(())
}
