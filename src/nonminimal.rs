// SPDX-License-Identifier: Apache-2.0

//! Removal of cells that some cheaper cell with the same function subsumes.
//!
//! A cell is non-minimal when another cell has the same unified primary
//! signature and a strictly smaller cost, where cost is the transistor count
//! with the PMOS count as a tiebreak. A minimum-cost cell of a function is
//! never deleted, so the result does not depend on how workers interleave.
//!
//! Workers address rows by position in an id snapshot taken before the stage
//! fans out; concurrent deletes would otherwise shift row offsets under them.

use std::collections::HashMap;

use crate::cleanup_error::CleanupResult;
use crate::partition::WorkRange;
use crate::storage::{CellId, CellRecord, CellStore, SignatureColumn};

/// Cost ordering used to compare cells implementing the same function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CellCost {
    pub transistors: usize,
    pub pmos: usize,
}

impl CellCost {
    pub fn of(record: &CellRecord) -> Self {
        Self {
            transistors: record.transistor_count(),
            pmos: record.pmos_count,
        }
    }
}

pub struct NonminimalEliminator<'a> {
    store: &'a dyn CellStore,
    table: &'a str,
    snapshot: &'a [CellId],
}

impl<'a> NonminimalEliminator<'a> {
    pub fn new(store: &'a dyn CellStore, table: &'a str, snapshot: &'a [CellId]) -> Self {
        Self {
            store,
            table,
            snapshot,
        }
    }

    /// Deletes the non-minimal cells among the snapshot ids at `range`;
    /// returns the number of deleted cells.
    pub fn eliminate(&self, range: WorkRange) -> CleanupResult<usize> {
        let end = range.end().min(self.snapshot.len());
        let start = range.start.min(end);
        let cells = self.store.fetch_ids(self.table, &self.snapshot[start..end])?;

        // Minimum cost per function seen by this worker.
        let mut minimum: HashMap<String, CellCost> = HashMap::new();
        let mut doomed = Vec::new();
        for cell in &cells {
            let key = match cell.unified(SignatureColumn::Bsf) {
                Some(key) => key,
                None => continue,
            };
            let best = match minimum.get(key) {
                Some(best) => *best,
                None => {
                    let best = self.minimum_cost(key)?;
                    minimum.insert(key.to_string(), best);
                    best
                }
            };
            let cost = CellCost::of(cell);
            if cost > best {
                log::trace!(
                    "cell {} ({:?}) is subsumed by a {:?} cell for {}",
                    cell.id,
                    cost,
                    best,
                    key
                );
                doomed.push(cell.id);
            }
        }

        if doomed.is_empty() {
            return Ok(0);
        }
        log::debug!(
            "{}: deleting {} non-minimal cell(s) in [{}, +{})",
            self.table,
            doomed.len(),
            range.start,
            range.size
        );
        Ok(self.store.delete(self.table, &doomed)?)
    }

    fn minimum_cost(&self, key: &str) -> CleanupResult<CellCost> {
        let group = self
            .store
            .fetch_by_unified(self.table, SignatureColumn::Bsf, key)?;
        // The group holds at least the cell that produced `key`; an empty
        // result means it was deleted meanwhile and nothing else can beat it.
        Ok(group.iter().map(CellCost::of).min().unwrap_or(CellCost {
            transistors: usize::MAX,
            pmos: usize::MAX,
        }))
    }
}
