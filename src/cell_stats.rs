// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use crate::storage::{CellStore, StorageResult};

/// Number of cells in `table` per transistor count.
pub fn transistor_histogram(
    store: &dyn CellStore,
    table: &str,
) -> StorageResult<BTreeMap<usize, usize>> {
    let mut histogram = BTreeMap::new();
    for record in store.all(table)? {
        *histogram.entry(record.transistor_count()).or_insert(0) += 1;
    }
    Ok(histogram)
}

/// Text form of a histogram, one line per bucket, e.g.
/// `"  4 transistor(s): 12 cell(s)"`.
pub struct HistogramReport<'a>(pub &'a BTreeMap<usize, usize>);

impl std::fmt::Display for HistogramReport<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (transistors, cells) in self.0 {
            writeln!(f, "{:>3} transistor(s): {} cell(s)", transistors, cells)?;
        }
        Ok(())
    }
}

pub fn format_histogram(histogram: &BTreeMap<usize, usize>) -> String {
    HistogramReport(histogram).to_string()
}
