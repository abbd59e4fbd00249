// SPDX-License-Identifier: Apache-2.0

//! Removal of structurally isomorphic duplicate cells.
//!
//! Work is partitioned over the sorted distinct unified primary signatures,
//! so every group of cells sharing a function is handled by exactly one
//! worker. Isomorphic cells always share that key (isomorphism only renames
//! inputs, and unification canonicalizes input order), so duplicates never
//! straddle two workers. Within a group the lowest id of each isomorphism
//! class survives.
//!
//! Deleting duplicates never empties a group, so the key listing the
//! partition offsets refer to is stable for the duration of the stage.

use crate::cleanup_error::CleanupResult;
use crate::equiv::is_isomorphic;
use crate::netlist::{Netlist, NetlistShape};
use crate::partition::WorkRange;
use crate::storage::{CellId, CellRecord, CellStore, SignatureColumn};

pub struct IsoEliminator<'a> {
    store: &'a dyn CellStore,
    table: &'a str,
}

impl<'a> IsoEliminator<'a> {
    pub fn new(store: &'a dyn CellStore, table: &'a str) -> Self {
        Self { store, table }
    }

    /// Deduplicates the grouping keys at `range` of the sorted key listing;
    /// returns the number of deleted cells.
    pub fn eliminate(&self, range: WorkRange) -> CleanupResult<usize> {
        let keys =
            self.store
                .distinct_unified(self.table, SignatureColumn::Bsf, range.start, range.size)?;
        let mut removed = 0;
        for key in &keys {
            removed += self.eliminate_group(key)?;
        }
        Ok(removed)
    }

    pub fn eliminate_group(&self, key: &str) -> CleanupResult<usize> {
        let cells = self
            .store
            .fetch_by_unified(self.table, SignatureColumn::Bsf, key)?;
        let doomed = duplicate_ids(&cells)?;
        if doomed.is_empty() {
            return Ok(0);
        }
        log::debug!(
            "{}: key {} has {} cell(s), deleting {} duplicate(s)",
            self.table,
            key,
            cells.len(),
            doomed.len()
        );
        Ok(self.store.delete(self.table, &doomed)?)
    }
}

/// Ids of the cells in `cells` that are isomorphic to an earlier cell.
///
/// `cells` is expected in ascending id order so the first-seen cell of each
/// class is the one retained. Every netlist is parsed, but orbits are only
/// walked for pairs of cells with equal shapes, and each walk stops at the
/// first match.
pub fn duplicate_ids(cells: &[CellRecord]) -> CleanupResult<Vec<CellId>> {
    let netlists = cells
        .iter()
        .map(CellRecord::parse_netlist)
        .collect::<CleanupResult<Vec<Netlist>>>()?;
    if cells.len() < 2 {
        return Ok(Vec::new());
    }

    let mut representatives: Vec<(CellId, NetlistShape, Netlist)> = Vec::new();
    let mut doomed = Vec::new();
    for (cell, netlist) in cells.iter().zip(netlists) {
        let shape = netlist.shape();
        let kept = representatives
            .iter()
            .find(|(_, rep_shape, rep)| *rep_shape == shape && is_isomorphic(rep, &netlist));
        match kept {
            Some((kept_id, _, _)) => {
                log::trace!("cell {} is isomorphic to cell {}", cell.id, kept_id);
                doomed.push(cell.id);
            }
            None => representatives.push((cell.id, shape, netlist)),
        }
    }
    Ok(doomed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup_error::CleanupError;
    use crate::equiv::orbit_size;
    use crate::test_utils::{
        cell, store_with, NAND2, NAND2_BSF, NAND2_MIRRORED, NAND2_RELABELED, NAND2_RENUMBERED,
        NOR2, NOR2_BSF,
    };
    use pretty_assertions::assert_eq;

    /// A cell whose orbit (`(n/2)!^2 · n! · 2^n` signatures) is far too
    /// large to walk.
    fn wide_cell(id: CellId, transistors: usize) -> CellRecord {
        let half = transistors / 2;
        let mut netlist = String::new();
        for i in 0..half {
            netlist.push_str(&format!("M{:02} O0 I{:02} GND GND NMOS\n", i, i));
        }
        for i in 0..half {
            netlist.push_str(&format!("M{:02} O0 I{:02} VDD VDD PMOS\n", half + i, i));
        }
        cell(id, &netlist, "1")
    }

    fn with_key(mut record: CellRecord, key: &str) -> CellRecord {
        record.bsf_unified = Some(key.to_string());
        record
    }

    #[test]
    fn test_duplicate_ids_keeps_first_of_each_class() {
        let cells = vec![
            cell(1, NAND2, NAND2_BSF),
            cell(2, NOR2, NAND2_BSF),
            cell(3, NAND2_RELABELED, NAND2_BSF),
            cell(4, NAND2_MIRRORED, NAND2_BSF),
        ];
        assert_eq!(duplicate_ids(&cells).unwrap(), vec![3, 4]);
    }

    #[test]
    fn test_singleton_group_skips_enumeration() {
        let lone = wide_cell(1, 24);
        assert!(orbit_size(&lone.parse_netlist().unwrap()) > 1u128 << 60);
        assert_eq!(duplicate_ids(&[lone]).unwrap(), Vec::<CellId>::new());
    }

    #[test]
    fn test_cells_of_different_shape_are_not_compared() {
        let cells = vec![wide_cell(1, 24), wide_cell(2, 22), cell(3, NAND2, NAND2_BSF)];
        assert_eq!(duplicate_ids(&cells).unwrap(), Vec::<CellId>::new());
    }

    #[test]
    fn test_duplicate_found_without_walking_whole_orbit() {
        let cells = vec![wide_cell(1, 24), wide_cell(2, 24)];
        assert_eq!(duplicate_ids(&cells).unwrap(), vec![2]);
    }

    #[test]
    fn test_singleton_group_still_reports_malformed_netlist() {
        assert!(duplicate_ids(&[cell(4, "M0 O0 I0 NMOS\n", NAND2_BSF)]).is_err());
    }

    #[test]
    fn test_duplicate_ids_reports_malformed_cell() {
        let cells = vec![cell(1, NAND2, NAND2_BSF), cell(9, "M0 O0 I0 NMOS\n", NAND2_BSF)];
        match duplicate_ids(&cells).unwrap_err() {
            CleanupError::MalformedNetlist { reason, .. } => {
                assert!(reason.starts_with("cell 9:"), "reason: {}", reason)
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_eliminate_only_touches_keys_in_range() {
        let store = store_with(
            "T",
            vec![
                with_key(cell(1, NAND2, NAND2_BSF), "1110"),
                with_key(cell(2, NAND2_RENUMBERED, NAND2_BSF), "1110"),
                with_key(cell(3, NOR2, NOR2_BSF), "1000"),
                with_key(cell(4, NOR2, NOR2_BSF), "1000"),
            ],
        );
        // Sorted keys are ["1000", "1110"]; only the NAND2 group is in range.
        let eliminator = IsoEliminator::new(&store, "T");
        let removed = eliminator.eliminate(WorkRange { start: 1, size: 1 }).unwrap();
        assert_eq!(removed, 1);
        let ids: Vec<CellId> = store.all("T").unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }
}
