// SPDX-License-Identifier: Apache-2.0

//! Function-level comparison of two cell tables.
//!
//! Cells are compared by unified primary signature. A table that has not
//! been through the unification stage is unified on the fly.

use std::collections::BTreeSet;

use crate::bsf::unify;
use crate::cleanup_error::CleanupResult;
use crate::storage::{CellStore, SignatureColumn};

/// Distinct unified primary signatures of `table`.
pub fn signature_set(store: &dyn CellStore, table: &str) -> CleanupResult<BTreeSet<String>> {
    let mut signatures = BTreeSet::new();
    for record in store.all(table)? {
        let signature = match record.unified(SignatureColumn::Bsf) {
            Some(unified) => unified.to_string(),
            None => unify(record.raw(SignatureColumn::Bsf))?,
        };
        signatures.insert(signature);
    }
    Ok(signatures)
}

/// Signatures of `table` that `reference` lacks, sorted ascending.
pub fn missing_from(
    store: &dyn CellStore,
    table: &str,
    reference: &str,
) -> CleanupResult<Vec<String>> {
    let ours = signature_set(store, table)?;
    let theirs = signature_set(store, reference)?;
    let missing: Vec<String> = ours.difference(&theirs).cloned().collect();
    log::debug!(
        "{}: {} function(s), {} absent from {}",
        table,
        ours.len(),
        missing.len(),
        reference
    );
    Ok(missing)
}

pub fn is_subset_of(store: &dyn CellStore, table: &str, reference: &str) -> CleanupResult<bool> {
    Ok(missing_from(store, table, reference)?.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::test_utils::{cell, INVERTER, INV_BSF, NAND2, NAND2_BSF, NOR2, NOR2_BSF};
    use pretty_assertions::assert_eq;

    fn library() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table("CLEAN").unwrap();
        store.create_table("REF").unwrap();
        store.insert("CLEAN", cell(1, NAND2, NAND2_BSF)).unwrap();
        for record in [
            cell(1, NAND2, NAND2_BSF),
            cell(2, NOR2, NOR2_BSF),
            cell(3, INVERTER, INV_BSF),
        ] {
            store.insert("REF", record).unwrap();
        }
        store
    }

    #[test]
    fn test_signature_set_unifies_raw_values() {
        let store = MemoryStore::new();
        store.create_table("T").unwrap();
        // `I1 & !I0` over a redundant third input.
        store.insert("T", cell(1, NAND2, "00100010")).unwrap();
        let mut stored = cell(2, NOR2, NOR2_BSF);
        stored.bsf_unified = Some("1000".to_string());
        store.insert("T", stored).unwrap();
        let expected: BTreeSet<String> = ["0010", "1000"].iter().map(|s| s.to_string()).collect();
        assert_eq!(signature_set(&store, "T").unwrap(), expected);
    }

    #[test]
    fn test_strict_subset() {
        let store = library();
        assert!(is_subset_of(&store, "CLEAN", "REF").unwrap());
        assert!(!is_subset_of(&store, "REF", "CLEAN").unwrap());
    }

    #[test]
    fn test_missing_signatures_are_sorted() {
        let store = library();
        assert_eq!(
            missing_from(&store, "REF", "CLEAN").unwrap(),
            vec!["10".to_string(), "1000".to_string()]
        );
    }

    #[test]
    fn test_extra_signature_is_not_subset() {
        let store = library();
        store.insert("CLEAN", cell(9, NAND2, "0110")).unwrap();
        assert!(!is_subset_of(&store, "CLEAN", "REF").unwrap());
    }

    #[test]
    fn test_missing_reference_table_is_error() {
        let store = library();
        assert!(is_subset_of(&store, "CLEAN", "NOPE").is_err());
    }
}
