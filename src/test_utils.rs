// SPDX-License-Identifier: Apache-2.0

//! Sample cells and store helpers shared by unit and integration tests.

use crate::storage::{CellRecord, CellStore, MemoryStore};

pub const INVERTER: &str = "\
M0 O0 I0 GND GND NMOS
M1 O0 I0 VDD VDD PMOS
";

pub const NAND2: &str = "\
M0 O0 I0 N0 GND NMOS
M1 N0 I1 GND GND NMOS
M2 O0 I0 VDD VDD PMOS
M3 O0 I1 VDD VDD PMOS
";

/// `NAND2` with its inputs exchanged and the diffusions of `M0` and `M3`
/// swapped.
pub const NAND2_RELABELED: &str = "\
M0 N0 I1 O0 GND NMOS
M1 N0 I0 GND GND NMOS
M2 O0 I1 VDD VDD PMOS
M3 VDD I0 O0 VDD PMOS
";

/// `NAND2` with the NMOS names exchanged and the diffusions of `M1` swapped.
pub const NAND2_RENUMBERED: &str = "\
M0 N0 I1 GND GND NMOS
M1 N0 I0 O0 GND NMOS
M2 O0 I0 VDD VDD PMOS
M3 O0 I1 VDD VDD PMOS
";

/// `NAND2` with the PMOS names exchanged and every diffusion pair swapped.
pub const NAND2_MIRRORED: &str = "\
M0 N0 I0 O0 GND NMOS
M1 GND I1 N0 GND NMOS
M2 VDD I1 O0 VDD PMOS
M3 VDD I0 O0 VDD PMOS
";

pub const NOR2: &str = "\
M0 O0 I0 GND GND NMOS
M1 O0 I1 GND GND NMOS
M2 N0 I0 VDD VDD PMOS
M3 O0 I1 N0 VDD PMOS
";

/// `!(I0 & I1 | I2)`
pub const AOI21: &str = "\
M0 O0 I0 N0 GND NMOS
M1 N0 I1 GND GND NMOS
M2 O0 I2 GND GND NMOS
M3 N1 I0 VDD VDD PMOS
M4 N1 I1 VDD VDD PMOS
M5 O0 I2 N1 VDD PMOS
";

/// Truth tables over the inputs in index order, LSB-first assignments.
pub const INV_BSF: &str = "10";
pub const NAND2_BSF: &str = "1110";
pub const NOR2_BSF: &str = "1000";

/// Builds a record, deriving the transistor counts from `netlist`.
pub fn cell(id: u64, netlist: &str, bsf: &str) -> CellRecord {
    let nmos_count = netlist.lines().filter(|l| l.ends_with("NMOS")).count();
    let pmos_count = netlist.lines().filter(|l| l.ends_with("PMOS")).count();
    CellRecord {
        id,
        netlist: netlist.to_string(),
        pmos_count,
        nmos_count,
        bsf: bsf.to_string(),
        bsf_weak: bsf.to_string(),
        bsf_unified: None,
        bsf_weak_unified: None,
    }
}

/// Creates `table` in a fresh store and inserts `cells`.
pub fn store_with(table: &str, cells: Vec<CellRecord>) -> MemoryStore {
    let store = MemoryStore::new();
    store.create_table(table).unwrap();
    for record in cells {
        store.insert(table, record).unwrap();
    }
    store
}
