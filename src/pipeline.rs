// SPDX-License-Identifier: Apache-2.0

//! Staged cleanup of a cell library.
//!
//! Stages run strictly one after another. Parallel stages fan out over the
//! worker pool and return only once every worker has been joined; nothing is
//! rolled back when a stage fails.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::bsf::unify;
use crate::cell_stats::transistor_histogram;
use crate::cleanup_error::{CleanupError, CleanupResult};
use crate::compare::missing_from;
use crate::iso_eliminator::IsoEliminator;
use crate::nonminimal::NonminimalEliminator;
use crate::storage::{columns, CellStore, DeletePredicate, SignatureColumn};
use crate::worker_pool::{default_worker_count, WorkerPool};

/// Columns indexed right after the working table is created.
pub const BASE_INDEXES: [&str; 5] = [
    columns::CELL_PMOS_CNT,
    columns::CELL_NMOS_CNT,
    columns::CELL_NETLIST,
    columns::CELL_BSF,
    columns::CELL_BSF_WEAK,
];

/// Columns indexed once both signature columns are unified.
pub const UNIFIED_INDEXES: [&str; 2] = [
    columns::CELL_BSF_UNIFIED,
    columns::CELL_BSF_WEAK_UNIFIED,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Working table; must not exist yet.
    pub table: String,
    pub source_table: String,
    pub reference_table: Option<String>,
    pub worker_count: usize,
}

impl PipelineConfig {
    pub fn new(table: &str, source_table: &str) -> Self {
        Self {
            table: table.to_string(),
            source_table: source_table.to_string(),
            reference_table: None,
            worker_count: default_worker_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    DuplicateTable,
    CreateIndexes,
    UnifyBsf,
    RemoveConstant,
    RemoveRedundantInput,
    UnifyBsfWeak,
    RemoveIsomorphic,
    RemoveNonminimal,
    CheckCoverage,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::DuplicateTable,
        Stage::CreateIndexes,
        Stage::UnifyBsf,
        Stage::RemoveConstant,
        Stage::RemoveRedundantInput,
        Stage::UnifyBsfWeak,
        Stage::RemoveIsomorphic,
        Stage::RemoveNonminimal,
        Stage::CheckCoverage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::DuplicateTable => "duplicate-table",
            Stage::CreateIndexes => "create-indexes",
            Stage::UnifyBsf => "unify-bsf",
            Stage::RemoveConstant => "remove-constant",
            Stage::RemoveRedundantInput => "remove-redundant-input",
            Stage::UnifyBsfWeak => "unify-bsf-weak",
            Stage::RemoveIsomorphic => "remove-isomorphic",
            Stage::RemoveNonminimal => "remove-nonminimal",
            Stage::CheckCoverage => "check-coverage",
        }
    }

    /// Whether the stage deletes cells.
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Stage::RemoveConstant
                | Stage::RemoveRedundantInput
                | Stage::RemoveIsomorphic
                | Stage::RemoveNonminimal
        )
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub stage: Stage,
    /// Rows updated by unification stages, rows deleted by removal stages.
    pub affected: usize,
    /// Table size once the stage finished.
    pub remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub initial_count: usize,
    pub stage_results: Vec<StageResult>,
    pub histogram: BTreeMap<usize, usize>,
    pub final_count: usize,
    /// Signatures missing from the reference table; `None` when no reference
    /// was configured.
    pub coverage: Option<Vec<String>>,
}

impl CleanupReport {
    pub fn removed_by(&self, stage: Stage) -> usize {
        self.stage_results
            .iter()
            .filter(|r| r.stage == stage && stage.is_mutating())
            .map(|r| r.affected)
            .sum()
    }

    /// Fails with `PreconditionViolation` when the cleaned library holds
    /// functions the reference library lacks.
    pub fn check_coverage(&self) -> CleanupResult<()> {
        match &self.coverage {
            Some(missing) if !missing.is_empty() => Err(CleanupError::PreconditionViolation {
                missing: missing.clone(),
            }),
            _ => Ok(()),
        }
    }
}

pub struct Pipeline {
    store: Arc<dyn CellStore>,
    config: PipelineConfig,
    pool: WorkerPool,
}

impl Pipeline {
    pub fn new(store: Arc<dyn CellStore>, config: PipelineConfig) -> Self {
        let pool = WorkerPool::new(config.worker_count);
        Self {
            store,
            config,
            pool,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CellStore> {
        &self.store
    }

    fn table(&self) -> &str {
        &self.config.table
    }

    /// Copies the source table into the working table.
    pub fn duplicate_table(&self) -> CleanupResult<usize> {
        self.store
            .duplicate_table(&self.config.table, &self.config.source_table)?;
        let count = self.store.count(self.table())?;
        log::info!(
            "copied {} cell(s) from {} into {}",
            count,
            self.config.source_table,
            self.config.table
        );
        Ok(count)
    }

    pub fn create_indexes(&self, columns: &[&str]) -> CleanupResult<usize> {
        for column in columns {
            self.store.add_index(self.table(), column)?;
        }
        log::debug!("{}: indexed {:?}", self.table(), columns);
        Ok(columns.len())
    }

    /// Fills the unified form of `column` for every cell, in parallel over
    /// rows.
    pub fn update_unified(&self, column: SignatureColumn) -> CleanupResult<usize> {
        let total = self.store.count(self.table())?;
        let table = self.config.table.clone();
        let stage = format!("unify {}", column.raw_name());
        self.pool
            .run_stage(&stage, total, &self.store, move |store, range| {
                let cells = store.fetch_range(&table, range.start, range.size)?;
                for cell in &cells {
                    let unified = unify(cell.raw(column))?;
                    store.set_unified(&table, cell.id, column, &unified)?;
                }
                Ok(cells.len())
            })
    }

    pub fn remove_constant(&self) -> CleanupResult<usize> {
        let predicate = DeletePredicate::UnifiedIn {
            column: SignatureColumn::Bsf,
            values: vec!["0".to_string(), "1".to_string()],
        };
        Ok(self.store.delete_where(self.table(), &predicate)?)
    }

    pub fn remove_redundant_input(&self) -> CleanupResult<usize> {
        let predicate = DeletePredicate::RawLongerThanUnified {
            column: SignatureColumn::Bsf,
        };
        Ok(self.store.delete_where(self.table(), &predicate)?)
    }

    pub fn remove_isomorphic(&self) -> CleanupResult<usize> {
        let total = self
            .store
            .count_distinct(self.table(), SignatureColumn::Bsf)?;
        let table = self.config.table.clone();
        self.pool.run_stage(
            Stage::RemoveIsomorphic.name(),
            total,
            &self.store,
            move |store, range| IsoEliminator::new(store, &table).eliminate(range),
        )
    }

    pub fn remove_nonminimal(&self) -> CleanupResult<usize> {
        let snapshot = Arc::new(self.store.ids(self.table())?);
        let table = self.config.table.clone();
        self.pool.run_stage(
            Stage::RemoveNonminimal.name(),
            snapshot.len(),
            &self.store,
            move |store, range| NonminimalEliminator::new(store, &table, &snapshot).eliminate(range),
        )
    }

    /// Signatures of the working table absent from the reference table, or
    /// `None` without a configured reference.
    pub fn check_coverage(&self) -> CleanupResult<Option<Vec<String>>> {
        let reference = match &self.config.reference_table {
            Some(reference) => reference,
            None => return Ok(None),
        };
        let missing = missing_from(self.store.as_ref(), self.table(), reference)?;
        if missing.is_empty() {
            log::info!("{} is covered by {}", self.table(), reference);
        } else {
            log::warn!(
                "{} has {} function(s) missing from {}",
                self.table(),
                missing.len(),
                reference
            );
        }
        Ok(Some(missing))
    }

    fn log_histogram(&self, stage: Stage) -> CleanupResult<()> {
        let histogram = transistor_histogram(self.store.as_ref(), self.table())?;
        log::info!("after {}: cells per transistor count {:?}", stage, histogram);
        Ok(())
    }

    fn run_stage(&self, stage: Stage) -> CleanupResult<usize> {
        match stage {
            Stage::DuplicateTable => self.duplicate_table(),
            Stage::CreateIndexes => self.create_indexes(&BASE_INDEXES),
            Stage::UnifyBsf => self.update_unified(SignatureColumn::Bsf),
            Stage::RemoveConstant => self.remove_constant(),
            Stage::RemoveRedundantInput => self.remove_redundant_input(),
            Stage::UnifyBsfWeak => {
                let updated = self.update_unified(SignatureColumn::BsfWeak)?;
                self.create_indexes(&UNIFIED_INDEXES)?;
                Ok(updated)
            }
            Stage::RemoveIsomorphic => self.remove_isomorphic(),
            Stage::RemoveNonminimal => self.remove_nonminimal(),
            Stage::CheckCoverage => Ok(0),
        }
    }

    /// Runs every stage in order.
    ///
    /// A coverage shortfall is reported in the returned report rather than as
    /// an error; see `CleanupReport::check_coverage`.
    pub fn run(&self) -> CleanupResult<CleanupReport> {
        let initial_count = self.store.count(&self.config.source_table)?;
        log::info!(
            "cleaning {} ({} cell(s)) into {} with {} worker(s)",
            self.config.source_table,
            initial_count,
            self.config.table,
            self.pool.worker_count()
        );

        let mut stage_results = Vec::with_capacity(Stage::ALL.len());
        let mut coverage = None;
        for stage in Stage::ALL {
            let affected = if stage == Stage::CheckCoverage {
                coverage = self.check_coverage()?;
                coverage.as_ref().map_or(0, Vec::len)
            } else {
                self.run_stage(stage)?
            };
            let remaining = self.store.count(self.table())?;
            if stage.is_mutating() {
                log::info!("{}: removed {} cell(s), {} left", stage, affected, remaining);
                self.log_histogram(stage)?;
            }
            stage_results.push(StageResult {
                stage,
                affected,
                remaining,
            });
        }

        let histogram = transistor_histogram(self.store.as_ref(), self.table())?;
        let final_count = self.store.count(self.table())?;
        Ok(CleanupReport {
            initial_count,
            stage_results,
            histogram,
            final_count,
            coverage,
        })
    }
}
