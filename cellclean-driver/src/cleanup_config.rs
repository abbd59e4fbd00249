// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use anyhow::Context;
use clap::ArgMatches;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "cellclean.toml";
pub const DEFAULT_SOURCE_TABLE: &str = "RAW_DATA_LIB";

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct CleanupConfig {
    /// Path to the JSON cell library file.
    pub library: Option<String>,

    /// Working table the cleaned library is written to; must not exist yet.
    pub table: Option<String>,

    /// Table the working table is copied from.
    pub source_table: Option<String>,

    /// Table whose functions the cleaned library must be a subset of.
    pub reference_table: Option<String>,

    /// Worker threads per parallel stage; defaults to the core count minus
    /// two.
    pub workers: Option<usize>,
}

#[derive(Deserialize)]
struct CellcleanToml {
    cleanup: CleanupConfig,
}

pub fn parse_config(text: &str) -> anyhow::Result<CleanupConfig> {
    let parsed: CellcleanToml = toml::from_str(text)?;
    Ok(parsed.cleanup)
}

pub fn load_config(path: &Path) -> anyhow::Result<CleanupConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    parse_config(&text).with_context(|| format!("parsing config file {}", path.display()))
}

/// Value of string flag `flag` if given on the command line, else `fallback`
/// from the config.
fn flag_or_config(matches: &ArgMatches, flag: &str, fallback: &Option<String>) -> Option<String> {
    match matches.get_one::<String>(flag) {
        Some(value) => Some(value.to_string()),
        None => fallback.clone(),
    }
}

pub fn get_library(matches: &ArgMatches, config: &Option<CleanupConfig>) -> anyhow::Result<String> {
    let fallback = config.as_ref().and_then(|c| c.library.clone());
    flag_or_config(matches, "library", &fallback)
        .ok_or_else(|| anyhow::anyhow!("no library given; pass --library or set cleanup.library"))
}

pub fn get_table(matches: &ArgMatches, config: &Option<CleanupConfig>) -> anyhow::Result<String> {
    let fallback = config.as_ref().and_then(|c| c.table.clone());
    flag_or_config(matches, "table", &fallback)
        .ok_or_else(|| anyhow::anyhow!("no table given; pass --table or set cleanup.table"))
}

pub fn get_source_table(matches: &ArgMatches, config: &Option<CleanupConfig>) -> String {
    let fallback = config.as_ref().and_then(|c| c.source_table.clone());
    flag_or_config(matches, "source_table", &fallback)
        .unwrap_or_else(|| DEFAULT_SOURCE_TABLE.to_string())
}

pub fn get_reference_table(
    matches: &ArgMatches,
    config: &Option<CleanupConfig>,
) -> Option<String> {
    let fallback = config.as_ref().and_then(|c| c.reference_table.clone());
    flag_or_config(matches, "reference_table", &fallback)
}

pub fn get_workers(matches: &ArgMatches, config: &Option<CleanupConfig>) -> Option<usize> {
    match matches.get_one::<usize>("workers") {
        Some(workers) => Some(*workers),
        None => config.as_ref().and_then(|c| c.workers),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, ArgAction};
    use pretty_assertions::assert_eq;

    fn command() -> clap::Command {
        clap::Command::new("test")
            .arg(Arg::new("library").long("library").action(ArgAction::Set))
            .arg(Arg::new("table").long("table").action(ArgAction::Set))
            .arg(
                Arg::new("source_table")
                    .long("source_table")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("reference_table")
                    .long("reference_table")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("workers")
                    .long("workers")
                    .value_parser(clap::value_parser!(usize))
                    .action(ArgAction::Set),
            )
    }

    const SAMPLE: &str = r#"
[cleanup]
library = "cells.json"
table = "CLEAN_LIB"
reference_table = "WORK_LIB"
workers = 8
"#;

    #[test]
    fn test_parse_config() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(
            config,
            CleanupConfig {
                library: Some("cells.json".to_string()),
                table: Some("CLEAN_LIB".to_string()),
                source_table: None,
                reference_table: Some("WORK_LIB".to_string()),
                workers: Some(8),
            }
        );
    }

    #[test]
    fn test_parse_config_rejects_missing_section() {
        assert!(parse_config("library = \"cells.json\"\n").is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let config = Some(parse_config(SAMPLE).unwrap());
        let matches = command().get_matches_from(["test", "--table", "OTHER", "--workers", "2"]);
        assert_eq!(get_table(&matches, &config).unwrap(), "OTHER");
        assert_eq!(get_library(&matches, &config).unwrap(), "cells.json");
        assert_eq!(get_workers(&matches, &config), Some(2));
        assert_eq!(get_source_table(&matches, &config), DEFAULT_SOURCE_TABLE);
        assert_eq!(
            get_reference_table(&matches, &config),
            Some("WORK_LIB".to_string())
        );
    }

    #[test]
    fn test_missing_values_without_config() {
        let matches = command().get_matches_from(["test"]);
        assert!(get_library(&matches, &None).is_err());
        assert!(get_table(&matches, &None).is_err());
        assert_eq!(get_reference_table(&matches, &None), None);
        assert_eq!(get_workers(&matches, &None), None);
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(load_config(&path).unwrap().workers, Some(8));
        assert!(load_config(&dir.path().join("absent.toml")).is_err());
    }
}
