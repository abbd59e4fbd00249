// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::sync::Arc;

use cellclean::cell_stats::format_histogram;
use cellclean::pipeline::{CleanupReport, Pipeline, PipelineConfig, Stage};
use cellclean::storage::{CellStore, MemoryStore};

use crate::cleanup_config::{
    get_library, get_reference_table, get_source_table, get_table, get_workers, CleanupConfig,
};

fn print_report(report: &CleanupReport) {
    println!("initial cells: {}", report.initial_count);
    for result in &report.stage_results {
        if result.stage.is_mutating() {
            println!(
                "{:>24}: removed {:>6}, remaining {:>6}",
                result.stage.name(),
                result.affected,
                result.remaining
            );
        }
    }
    println!("final cells: {}", report.final_count);
    print!("{}", format_histogram(&report.histogram));
    if let Some(missing) = &report.coverage {
        println!(
            "{}: {} function(s) missing from the reference",
            Stage::CheckCoverage,
            missing.len()
        );
    }
}

pub fn handle_clean_up(
    matches: &clap::ArgMatches,
    config: &Option<CleanupConfig>,
) -> anyhow::Result<()> {
    let library = get_library(matches, config)?;
    let mut pipeline_config =
        PipelineConfig::new(&get_table(matches, config)?, &get_source_table(matches, config));
    pipeline_config.reference_table = get_reference_table(matches, config);
    if let Some(workers) = get_workers(matches, config) {
        pipeline_config.worker_count = workers;
    }

    let path = Path::new(&library);
    let store = Arc::new(MemoryStore::open(path)?);
    let shared: Arc<dyn CellStore> = store.clone();
    let pipeline = Pipeline::new(shared, pipeline_config);
    let outcome = pipeline.run();

    // Stages that completed before a failure stay applied, so persist either
    // way.
    store.save(path)?;
    log::info!("saved library to {}", path.display());

    let report = outcome?;
    print_report(&report);
    report.check_coverage()?;
    Ok(())
}
