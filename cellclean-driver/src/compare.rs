// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use cellclean::compare::missing_from;
use cellclean::storage::MemoryStore;

use crate::cleanup_config::{get_library, get_reference_table, get_table, CleanupConfig};

/// Fails when `table` implements a function `reference_table` lacks.
pub fn handle_compare(
    matches: &clap::ArgMatches,
    config: &Option<CleanupConfig>,
) -> anyhow::Result<()> {
    let library = get_library(matches, config)?;
    let table = get_table(matches, config)?;
    let reference = get_reference_table(matches, config).ok_or_else(|| {
        anyhow::anyhow!("no reference table given; pass --reference_table or set cleanup.reference_table")
    })?;
    let store = MemoryStore::open(Path::new(&library))?;
    let missing = missing_from(&store, &table, &reference)?;
    for signature in &missing {
        println!("{}", signature);
    }
    if !missing.is_empty() {
        anyhow::bail!(
            "{} has {} function(s) not present in {}",
            table,
            missing.len(),
            reference
        );
    }
    println!("{} is a subset of {}", table, reference);
    Ok(())
}
