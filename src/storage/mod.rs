// SPDX-License-Identifier: Apache-2.0

//! Persisted cell library access.
//!
//! The cleanup pipeline only touches the library through `CellStore`. Every
//! operation is atomic on its own; nothing groups several operations into a
//! transaction, so a failed stage leaves earlier deletions in place.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::cleanup_error::{CleanupError, CleanupResult};
use crate::netlist::Netlist;

pub use memory::MemoryStore;

pub type CellId = u64;

/// Column names of the cell table.
pub mod columns {
    pub const CELL_PMOS_CNT: &str = "CELL_PMOS_CNT";
    pub const CELL_NMOS_CNT: &str = "CELL_NMOS_CNT";
    pub const CELL_NETLIST: &str = "CELL_NETLIST";
    pub const CELL_BSF: &str = "CELL_BSF";
    pub const CELL_BSF_WEAK: &str = "CELL_BSF_weak";
    pub const CELL_BSF_UNIFIED: &str = "CELL_BSF_UNIFIED";
    pub const CELL_BSF_WEAK_UNIFIED: &str = "CELL_BSF_weak_UNIFIED";
}

/// One library row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRecord {
    pub id: CellId,
    pub netlist: String,
    pub pmos_count: usize,
    pub nmos_count: usize,
    pub bsf: String,
    pub bsf_weak: String,
    #[serde(default)]
    pub bsf_unified: Option<String>,
    #[serde(default)]
    pub bsf_weak_unified: Option<String>,
}

impl CellRecord {
    pub fn transistor_count(&self) -> usize {
        self.pmos_count + self.nmos_count
    }

    /// Parses the netlist column, tagging parse errors with the cell id.
    pub fn parse_netlist(&self) -> CleanupResult<Netlist> {
        Netlist::parse(&self.netlist).map_err(|e| match e {
            CleanupError::MalformedNetlist { line, reason } => CleanupError::MalformedNetlist {
                line,
                reason: format!("cell {}: {}", self.id, reason),
            },
            other => other,
        })
    }

    pub fn raw(&self, column: SignatureColumn) -> &str {
        match column {
            SignatureColumn::Bsf => &self.bsf,
            SignatureColumn::BsfWeak => &self.bsf_weak,
        }
    }

    pub fn unified(&self, column: SignatureColumn) -> Option<&str> {
        match column {
            SignatureColumn::Bsf => self.bsf_unified.as_deref(),
            SignatureColumn::BsfWeak => self.bsf_weak_unified.as_deref(),
        }
    }

    pub fn set_unified(&mut self, column: SignatureColumn, value: String) {
        match column {
            SignatureColumn::Bsf => self.bsf_unified = Some(value),
            SignatureColumn::BsfWeak => self.bsf_weak_unified = Some(value),
        }
    }
}

/// The two boolean-function signature columns; each has a raw and a unified
/// form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureColumn {
    Bsf,
    BsfWeak,
}

impl SignatureColumn {
    pub fn raw_name(self) -> &'static str {
        match self {
            SignatureColumn::Bsf => columns::CELL_BSF,
            SignatureColumn::BsfWeak => columns::CELL_BSF_WEAK,
        }
    }

    pub fn unified_name(self) -> &'static str {
        match self {
            SignatureColumn::Bsf => columns::CELL_BSF_UNIFIED,
            SignatureColumn::BsfWeak => columns::CELL_BSF_WEAK_UNIFIED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletePredicate {
    /// Unified value of `column` is one of `values`.
    UnifiedIn {
        column: SignatureColumn,
        values: Vec<String>,
    },
    /// Raw value of `column` is longer than its unified value.
    RawLongerThanUnified { column: SignatureColumn },
}

impl DeletePredicate {
    pub fn matches(&self, record: &CellRecord) -> bool {
        match self {
            DeletePredicate::UnifiedIn { column, values } => record
                .unified(*column)
                .map_or(false, |u| values.iter().any(|v| v == u)),
            DeletePredicate::RawLongerThanUnified { column } => record
                .unified(*column)
                .map_or(false, |u| record.raw(*column).len() > u.len()),
        }
    }
}

#[derive(Debug)]
pub enum StorageError {
    TableExists { table: String },
    NoSuchTable { table: String },
    DuplicateKey { table: String, id: CellId },
    NoSuchCell { table: String, id: CellId },
    Io(std::io::Error),
    Serde(serde_json::Error),
    Backend(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::TableExists { table } => write!(f, "table {} already exists", table),
            StorageError::NoSuchTable { table } => write!(f, "table {} does not exist", table),
            StorageError::DuplicateKey { table, id } => {
                write!(f, "duplicate cell id {} in table {}", id, table)
            }
            StorageError::NoSuchCell { table, id } => {
                write!(f, "cell id {} not found in table {}", id, table)
            }
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
            StorageError::Serde(e) => write!(f, "serialization error: {}", e),
            StorageError::Backend(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Serde(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serde(e)
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Access to a library of cell tables.
///
/// Row-returning operations order rows by ascending id; signature listings
/// are sorted ascending. Ranges are `(start, size)` offsets into that order.
pub trait CellStore: Send + Sync {
    fn table_exists(&self, table: &str) -> StorageResult<bool>;

    fn create_table(&self, table: &str) -> StorageResult<()>;

    /// Copies every row and index of `source` into a new table `table`.
    fn duplicate_table(&self, table: &str, source: &str) -> StorageResult<()>;

    fn add_index(&self, table: &str, column: &str) -> StorageResult<()>;

    fn remove_index(&self, table: &str, column: &str) -> StorageResult<()>;

    fn indexes(&self, table: &str) -> StorageResult<Vec<String>>;

    fn insert(&self, table: &str, record: CellRecord) -> StorageResult<()>;

    fn count(&self, table: &str) -> StorageResult<usize>;

    /// Number of distinct non-null unified values of `column`.
    fn count_distinct(&self, table: &str, column: SignatureColumn) -> StorageResult<usize>;

    fn fetch_range(&self, table: &str, start: usize, size: usize)
        -> StorageResult<Vec<CellRecord>>;

    /// All ids of `table`, ascending.
    fn ids(&self, table: &str) -> StorageResult<Vec<CellId>>;

    /// Rows for the listed ids that still exist.
    fn fetch_ids(&self, table: &str, ids: &[CellId]) -> StorageResult<Vec<CellRecord>>;

    /// Rows whose unified `column` equals `value`.
    fn fetch_by_unified(
        &self,
        table: &str,
        column: SignatureColumn,
        value: &str,
    ) -> StorageResult<Vec<CellRecord>>;

    fn distinct_unified(
        &self,
        table: &str,
        column: SignatureColumn,
        start: usize,
        size: usize,
    ) -> StorageResult<Vec<String>>;

    fn set_unified(
        &self,
        table: &str,
        id: CellId,
        column: SignatureColumn,
        value: &str,
    ) -> StorageResult<()>;

    /// Deletes the listed ids, ignoring ones already gone; returns how many
    /// rows were removed.
    fn delete(&self, table: &str, ids: &[CellId]) -> StorageResult<usize>;

    fn delete_where(&self, table: &str, predicate: &DeletePredicate) -> StorageResult<usize>;

    fn all(&self, table: &str) -> StorageResult<Vec<CellRecord>>;
}
