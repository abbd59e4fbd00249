// SPDX-License-Identifier: Apache-2.0

//! Deduplication and minimization of transistor-level standard-cell
//! libraries.
//!
//! A library is a table of cells, each a flat NMOS/PMOS netlist plus truth
//! table signatures. `pipeline::Pipeline` copies a source table and then
//! drops constant cells, cells with redundant inputs, structurally
//! isomorphic duplicates and cells that a cheaper cell with the same
//! function subsumes.

pub mod bsf;
pub mod cell_stats;
pub mod cleanup_error;
pub mod compare;
pub mod equiv;
pub mod iso_eliminator;
pub mod netlist;
pub mod nonminimal;
pub mod partition;
pub mod pipeline;
pub mod storage;
pub mod test_utils;
pub mod worker_pool;

pub use cleanup_error::{CleanupError, CleanupResult};
pub use netlist::Netlist;
pub use pipeline::{CleanupReport, Pipeline, PipelineConfig, Stage};
pub use storage::{CellRecord, CellStore, MemoryStore};
