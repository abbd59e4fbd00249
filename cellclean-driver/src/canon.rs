// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use anyhow::Context;
use cellclean::equiv::{canonical_signature, enumerate_signatures, orbit_size};
use cellclean::Netlist;

use crate::cleanup_config::CleanupConfig;

/// Canonical signature and orbit size of the netlist in `text`, as printed by
/// the `canon` subcommand.
pub fn describe(text: &str) -> anyhow::Result<String> {
    let netlist = Netlist::parse(text)?;
    Ok(format!(
        "orbit size: {}\n{}",
        orbit_size(&netlist),
        canonical_signature(&netlist)
    ))
}

pub fn handle_canon(
    matches: &clap::ArgMatches,
    _config: &Option<CleanupConfig>,
) -> anyhow::Result<()> {
    let input = matches
        .get_one::<String>("netlist_file")
        .ok_or_else(|| anyhow::anyhow!("missing netlist file"))?;
    let path = Path::new(input);
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading netlist {}", path.display()))?;

    if let Some(limit) = matches.get_one::<usize>("print_orbit") {
        let netlist = Netlist::parse(&text)?;
        for (i, signature) in enumerate_signatures(&netlist).take(*limit).enumerate() {
            println!("# {}\n{}", i, signature);
        }
        return Ok(());
    }
    print!("{}", describe(&text)?);
    Ok(())
}
