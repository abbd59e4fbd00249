// SPDX-License-Identifier: Apache-2.0

//! In-process `CellStore` with JSON persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::storage::{
    CellId, CellRecord, CellStore, DeletePredicate, SignatureColumn, StorageError, StorageResult,
};

const STORE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Table {
    rows: BTreeMap<CellId, CellRecord>,
    indexes: BTreeSet<String>,
}

impl Table {
    fn distinct_unified(&self, column: SignatureColumn) -> BTreeSet<&str> {
        self.rows
            .values()
            .filter_map(|r| r.unified(column))
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreOnDisk {
    version: u32,
    tables: BTreeMap<String, Table>,
}

/// All tables held in memory behind one lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<BTreeMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a store previously written by `save`; a missing file yields an
    /// empty store.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if !path.exists() {
            log::info!("library file {} not found; starting empty", path.display());
            return Ok(Self::new());
        }
        let text = std::fs::read_to_string(path)?;
        let on_disk: StoreOnDisk = serde_json::from_str(&text)?;
        if on_disk.version != STORE_FORMAT_VERSION {
            return Err(StorageError::Backend(format!(
                "{}: unsupported store format version {} (expected {})",
                path.display(),
                on_disk.version,
                STORE_FORMAT_VERSION
            )));
        }
        log::debug!(
            "loaded {} table(s) from {}",
            on_disk.tables.len(),
            path.display()
        );
        Ok(Self {
            tables: Mutex::new(on_disk.tables),
        })
    }

    pub fn save(&self, path: &Path) -> StorageResult<()> {
        let tables = self.lock()?;
        let on_disk = StoreOnDisk {
            version: STORE_FORMAT_VERSION,
            tables: tables.clone(),
        };
        let text = serde_json::to_string_pretty(&on_disk)?;
        std::fs::write(path, text)?;
        log::debug!("saved {} table(s) to {}", tables.len(), path.display());
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, BTreeMap<String, Table>>> {
        self.tables
            .lock()
            .map_err(|_| StorageError::Backend("cell store lock poisoned".to_string()))
    }

    fn with_table<R>(&self, table: &str, f: impl FnOnce(&Table) -> R) -> StorageResult<R> {
        let tables = self.lock()?;
        let t = tables.get(table).ok_or_else(|| StorageError::NoSuchTable {
            table: table.to_string(),
        })?;
        Ok(f(t))
    }

    fn with_table_mut<R>(
        &self,
        table: &str,
        f: impl FnOnce(&mut Table) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let mut tables = self.lock()?;
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::NoSuchTable {
                table: table.to_string(),
            })?;
        f(t)
    }
}

impl CellStore for MemoryStore {
    fn table_exists(&self, table: &str) -> StorageResult<bool> {
        Ok(self.lock()?.contains_key(table))
    }

    fn create_table(&self, table: &str) -> StorageResult<()> {
        let mut tables = self.lock()?;
        if tables.contains_key(table) {
            return Err(StorageError::TableExists {
                table: table.to_string(),
            });
        }
        tables.insert(table.to_string(), Table::default());
        Ok(())
    }

    fn duplicate_table(&self, table: &str, source: &str) -> StorageResult<()> {
        let mut tables = self.lock()?;
        if tables.contains_key(table) {
            return Err(StorageError::TableExists {
                table: table.to_string(),
            });
        }
        let copy = tables
            .get(source)
            .ok_or_else(|| StorageError::NoSuchTable {
                table: source.to_string(),
            })?
            .clone();
        tables.insert(table.to_string(), copy);
        Ok(())
    }

    fn add_index(&self, table: &str, column: &str) -> StorageResult<()> {
        self.with_table_mut(table, |t| {
            t.indexes.insert(column.to_string());
            Ok(())
        })
    }

    fn remove_index(&self, table: &str, column: &str) -> StorageResult<()> {
        self.with_table_mut(table, |t| {
            t.indexes.remove(column);
            Ok(())
        })
    }

    fn indexes(&self, table: &str) -> StorageResult<Vec<String>> {
        self.with_table(table, |t| t.indexes.iter().cloned().collect())
    }

    fn insert(&self, table: &str, record: CellRecord) -> StorageResult<()> {
        self.with_table_mut(table, |t| {
            if t.rows.contains_key(&record.id) {
                return Err(StorageError::DuplicateKey {
                    table: table.to_string(),
                    id: record.id,
                });
            }
            t.rows.insert(record.id, record);
            Ok(())
        })
    }

    fn count(&self, table: &str) -> StorageResult<usize> {
        self.with_table(table, |t| t.rows.len())
    }

    fn count_distinct(&self, table: &str, column: SignatureColumn) -> StorageResult<usize> {
        self.with_table(table, |t| t.distinct_unified(column).len())
    }

    fn fetch_range(
        &self,
        table: &str,
        start: usize,
        size: usize,
    ) -> StorageResult<Vec<CellRecord>> {
        self.with_table(table, |t| {
            t.rows.values().skip(start).take(size).cloned().collect()
        })
    }

    fn ids(&self, table: &str) -> StorageResult<Vec<CellId>> {
        self.with_table(table, |t| t.rows.keys().copied().collect())
    }

    fn fetch_ids(&self, table: &str, ids: &[CellId]) -> StorageResult<Vec<CellRecord>> {
        self.with_table(table, |t| {
            ids.iter()
                .filter_map(|id| t.rows.get(id))
                .cloned()
                .collect()
        })
    }

    fn fetch_by_unified(
        &self,
        table: &str,
        column: SignatureColumn,
        value: &str,
    ) -> StorageResult<Vec<CellRecord>> {
        self.with_table(table, |t| {
            t.rows
                .values()
                .filter(|r| r.unified(column) == Some(value))
                .cloned()
                .collect()
        })
    }

    fn distinct_unified(
        &self,
        table: &str,
        column: SignatureColumn,
        start: usize,
        size: usize,
    ) -> StorageResult<Vec<String>> {
        self.with_table(table, |t| {
            t.distinct_unified(column)
                .into_iter()
                .skip(start)
                .take(size)
                .map(str::to_string)
                .collect()
        })
    }

    fn set_unified(
        &self,
        table: &str,
        id: CellId,
        column: SignatureColumn,
        value: &str,
    ) -> StorageResult<()> {
        self.with_table_mut(table, |t| {
            let record = t.rows.get_mut(&id).ok_or_else(|| StorageError::NoSuchCell {
                table: table.to_string(),
                id,
            })?;
            record.set_unified(column, value.to_string());
            Ok(())
        })
    }

    fn delete(&self, table: &str, ids: &[CellId]) -> StorageResult<usize> {
        self.with_table_mut(table, |t| {
            Ok(ids.iter().filter(|id| t.rows.remove(*id).is_some()).count())
        })
    }

    fn delete_where(&self, table: &str, predicate: &DeletePredicate) -> StorageResult<usize> {
        self.with_table_mut(table, |t| {
            let before = t.rows.len();
            t.rows.retain(|_, r| !predicate.matches(r));
            Ok(before - t.rows.len())
        })
    }

    fn all(&self, table: &str) -> StorageResult<Vec<CellRecord>> {
        self.with_table(table, |t| t.rows.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{cell, store_with, INVERTER, INV_BSF, NAND2, NAND2_BSF};
    use pretty_assertions::assert_eq;

    fn unified(mut record: CellRecord, value: &str) -> CellRecord {
        record.bsf_unified = Some(value.to_string());
        record
    }

    #[test]
    fn test_duplicate_table_fails_when_target_exists() {
        let store = store_with("SRC", vec![cell(1, INVERTER, INV_BSF)]);
        store.add_index("SRC", "CELL_BSF").unwrap();
        store.duplicate_table("DST", "SRC").unwrap();
        assert_eq!(store.count("DST").unwrap(), 1);
        assert_eq!(store.indexes("DST").unwrap(), vec!["CELL_BSF".to_string()]);
        assert!(matches!(
            store.duplicate_table("DST", "SRC"),
            Err(StorageError::TableExists { .. })
        ));
        assert!(matches!(
            store.duplicate_table("OTHER", "MISSING"),
            Err(StorageError::NoSuchTable { .. })
        ));
    }

    #[test]
    fn test_insert_rejects_duplicate_key() {
        let store = store_with("T", vec![cell(1, INVERTER, INV_BSF)]);
        assert!(matches!(
            store.insert("T", cell(1, NAND2, NAND2_BSF)),
            Err(StorageError::DuplicateKey { id: 1, .. })
        ));
    }

    #[test]
    fn test_ranges_and_distinct_are_ordered() {
        let store = store_with(
            "T",
            vec![
                unified(cell(30, NAND2, NAND2_BSF), "1110"),
                unified(cell(10, INVERTER, INV_BSF), "10"),
                unified(cell(20, INVERTER, INV_BSF), "10"),
            ],
        );
        let ids: Vec<CellId> = store
            .fetch_range("T", 1, 5)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![20, 30]);
        assert_eq!(store.count_distinct("T", SignatureColumn::Bsf).unwrap(), 2);
        assert_eq!(
            store
                .distinct_unified("T", SignatureColumn::Bsf, 0, 10)
                .unwrap(),
            vec!["10".to_string(), "1110".to_string()]
        );
        let group = store
            .fetch_by_unified("T", SignatureColumn::Bsf, "10")
            .unwrap();
        assert_eq!(group.iter().map(|r| r.id).collect::<Vec<_>>(), vec![10, 20]);
    }

    #[test]
    fn test_delete_and_delete_where() {
        let store = store_with(
            "T",
            vec![
                unified(cell(1, INVERTER, "1010"), "10"),
                unified(cell(2, INVERTER, INV_BSF), "10"),
                unified(cell(3, NAND2, NAND2_BSF), "1110"),
            ],
        );
        let removed = store
            .delete_where(
                "T",
                &DeletePredicate::RawLongerThanUnified {
                    column: SignatureColumn::Bsf,
                },
            )
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.delete("T", &[2, 2, 99]).unwrap(), 1);
        assert_eq!(store.count("T").unwrap(), 1);
    }

    #[test]
    fn test_set_unified_missing_cell() {
        let store = store_with("T", vec![cell(1, INVERTER, INV_BSF)]);
        store
            .set_unified("T", 1, SignatureColumn::BsfWeak, "10")
            .unwrap();
        assert_eq!(
            store.all("T").unwrap()[0].bsf_weak_unified.as_deref(),
            Some("10")
        );
        assert!(matches!(
            store.set_unified("T", 7, SignatureColumn::Bsf, "10"),
            Err(StorageError::NoSuchCell { id: 7, .. })
        ));
    }

    #[test]
    fn test_save_open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.json");
        let store = store_with(
            "T",
            vec![cell(1, INVERTER, INV_BSF), cell(2, NAND2, NAND2_BSF)],
        );
        store.add_index("T", "CELL_NETLIST").unwrap();
        store.save(&path).unwrap();

        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(reopened.all("T").unwrap(), store.all("T").unwrap());
        assert_eq!(reopened.indexes("T").unwrap(), vec!["CELL_NETLIST"]);
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(&dir.path().join("absent.json")).unwrap();
        assert!(!store.table_exists("T").unwrap());
    }
}
