// SPDX-License-Identifier: Apache-2.0

//! Structural equivalence of cell netlists.
//!
//! Two netlists are isomorphic when one can be turned into the other by
//! relabeling within the symmetry group of a cell:
//! - permuting PMOS transistor names among themselves,
//! - permuting NMOS transistor names among themselves,
//! - permuting input, internal and output node names within their category,
//! - swapping the two diffusion terminals of any transistor.
//!
//! Supply rails are fixed points. The orbit of a netlist under this group is
//! enumerated lazily; each element is the textual form of one relabeling.
//! Orbits grow as `p!·n!·i!·k!·o!·2^t`, so callers that only need a yes/no
//! answer should stop at the first match (`is_isomorphic` does).

use std::ops::Range;

use itertools::structs::{MultiProduct, Permutations};
use itertools::Itertools;

use crate::netlist::{
    push_transistor_line, Netlist, NodeCategory, NodeId, TransistorId, TransistorKind,
};

/// One transistor line after relabeling; all names borrow from the netlist.
#[derive(Debug, Clone)]
struct RelabeledLine<'a> {
    id: &'a str,
    diffusion: [&'a str; 2],
    gate: &'a str,
    bulk: &'a str,
    kind: TransistorKind,
}

/// Lazy iterator over every textual signature in a netlist's orbit.
///
/// Name permutations form the outer loop; for each of them the combined
/// transistor list is sorted NMOS first, then by relabeled name, and every diffusion-swap mask
/// is emitted, bit `i` applying to the `i`-th sorted line. The netlist is only
/// borrowed, so several orbits may be walked concurrently.
#[derive(Clone)]
pub struct SignatureOrbit<'a> {
    netlist: &'a Netlist,
    transistor_groups: [Vec<TransistorId>; 2],
    node_groups: [Vec<NodeId>; 3],
    permutations: MultiProduct<Permutations<Range<usize>>>,
    lines: Option<Vec<RelabeledLine<'a>>>,
    mask: u64,
    mask_end: u64,
}

impl<'a> SignatureOrbit<'a> {
    fn new(netlist: &'a Netlist) -> Self {
        let transistor_groups = [
            netlist.transistor_ids(TransistorKind::Pmos),
            netlist.transistor_ids(TransistorKind::Nmos),
        ];
        let node_groups = NodeCategory::RENAMEABLE.map(|c| netlist.node_ids(c));
        let group_sizes: Vec<usize> = transistor_groups
            .iter()
            .map(Vec::len)
            .chain(node_groups.iter().map(Vec::len))
            .collect();
        let permutations = group_sizes
            .into_iter()
            .map(|len| (0..len).permutations(len))
            .multi_cartesian_product();
        Self {
            netlist,
            transistor_groups,
            node_groups,
            permutations,
            lines: None,
            mask: 0,
            mask_end: 1u64 << netlist.transistors().len(),
        }
    }

    /// Computes the relabeled, name-sorted lines for one choice of group
    /// permutations. `choice[g][i] = j` gives member `i` of group `g` the
    /// original name of member `j`.
    fn relabel(&self, choice: &[Vec<usize>]) -> Vec<RelabeledLine<'a>> {
        let netlist = self.netlist;
        let mut node_names: Vec<&'a str> = netlist.nodes().iter().map(|n| n.name()).collect();
        let mut transistor_names: Vec<&'a str> =
            netlist.transistors().iter().map(|t| t.name()).collect();

        for (group, perm) in self.transistor_groups.iter().zip(&choice[..2]) {
            for (member, &source) in group.iter().zip(perm) {
                transistor_names[member.0] = netlist.transistor(group[source]).name();
            }
        }
        for (group, perm) in self.node_groups.iter().zip(&choice[2..]) {
            for (member, &source) in group.iter().zip(perm) {
                node_names[member.0] = netlist.node_name(group[source]);
            }
        }

        let mut lines: Vec<RelabeledLine<'a>> = netlist
            .transistors()
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let [a, b] = t.diffusion();
                RelabeledLine {
                    id: transistor_names[i],
                    diffusion: [node_names[a.0], node_names[b.0]],
                    gate: node_names[t.gate().0],
                    bulk: t.bulk(),
                    kind: t.kind(),
                }
            })
            .collect();
        lines.sort_by(|x, y| (x.kind, x.id).cmp(&(y.kind, y.id)));
        lines
    }
}

fn render(lines: &[RelabeledLine<'_>], mask: u64) -> String {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        push_transistor_line(
            &mut out,
            line.id,
            line.diffusion,
            line.gate,
            line.bulk,
            line.kind,
            (mask >> i) & 1 != 0,
        );
    }
    out
}

impl<'a> Iterator for SignatureOrbit<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(lines) = &self.lines {
                if self.mask < self.mask_end {
                    let text = render(lines, self.mask);
                    self.mask += 1;
                    return Some(text);
                }
            }
            let choice = self.permutations.next()?;
            self.lines = Some(self.relabel(&choice));
            self.mask = 0;
        }
    }
}

/// Returns the lazy orbit of `netlist`. Calling this again restarts the
/// enumeration from the identity relabeling.
pub fn enumerate_signatures(netlist: &Netlist) -> SignatureOrbit<'_> {
    SignatureOrbit::new(netlist)
}

fn factorial(n: usize) -> u128 {
    (1..=n as u128).fold(1u128, |acc, x| acc.saturating_mul(x))
}

/// Number of elements `enumerate_signatures` yields, saturating at
/// `u128::MAX`.
pub fn orbit_size(netlist: &Netlist) -> u128 {
    let perms = [
        netlist.pmos().count(),
        netlist.nmos().count(),
    ]
    .into_iter()
    .chain(NodeCategory::RENAMEABLE.map(|c| netlist.node_ids(c).len()))
    .map(factorial)
    .fold(1u128, |acc, x| acc.saturating_mul(x));
    perms.saturating_mul(1u128 << netlist.transistors().len())
}

/// Lexicographically smallest signature in the orbit of `netlist`.
///
/// This walks the whole orbit.
pub fn canonical_signature(netlist: &Netlist) -> String {
    enumerate_signatures(netlist)
        .min()
        .unwrap_or_else(|| netlist.to_text())
}

/// Returns true if `rhs` is a relabeling of `lhs`.
///
/// Orbits permute names within a cell's own name pool, so cells must draw
/// their node and transistor names from the same pools to compare equal.
pub fn is_isomorphic(lhs: &Netlist, rhs: &Netlist) -> bool {
    if lhs.shape() != rhs.shape() {
        return false;
    }
    let target = rhs.to_text();
    let found = enumerate_signatures(lhs).any(|candidate| candidate == target);
    log::trace!("is_isomorphic: found={} target={:?}", found, target);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{AOI21, INVERTER, NAND2, NAND2_RELABELED, NOR2};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use test_case::test_case;

    #[test_case(INVERTER, 4; "inverter")]
    #[test_case(NAND2, 128; "nand2")]
    #[test_case(NOR2, 128; "nor2")]
    #[test_case(AOI21, 6 * 6 * 6 * 2 * 64; "aoi21")]
    fn test_orbit_count_matches_formula(text: &str, want: u128) {
        let netlist = Netlist::parse(text).unwrap();
        assert_eq!(orbit_size(&netlist), want);
        assert_eq!(enumerate_signatures(&netlist).count() as u128, want);
    }

    #[test]
    fn test_first_signature_is_identity() {
        let netlist = Netlist::parse(NAND2).unwrap();
        let first = enumerate_signatures(&netlist).next().unwrap();
        assert_eq!(first, netlist.to_text());
    }

    #[test]
    fn test_orbit_of_distinct_names_has_no_duplicates() {
        let netlist = Netlist::parse(NAND2).unwrap();
        let all: Vec<String> = enumerate_signatures(&netlist).collect();
        let distinct: HashSet<&String> = all.iter().collect();
        assert_eq!(distinct.len(), all.len());
    }

    #[test]
    fn test_enumeration_leaves_netlist_untouched_and_restarts() {
        let netlist = Netlist::parse(AOI21).unwrap();
        let before = netlist.clone();
        let orbit = enumerate_signatures(&netlist);
        let first_pass: Vec<String> = orbit.clone().take(100).collect();
        let second_pass: Vec<String> = orbit.take(100).collect();
        assert_eq!(first_pass, second_pass);
        assert_eq!(netlist, before);
    }

    #[test]
    fn test_early_termination_on_huge_orbit() {
        // 12 transistors: 6!·6!·6!·2^12 signatures, far too many to walk.
        let mut text = String::new();
        for i in 0..6 {
            text.push_str(&format!("M{:02} O0 I{} GND GND NMOS\n", i, i));
        }
        for i in 0..6 {
            text.push_str(&format!("M{:02} O0 I{} VDD VDD PMOS\n", i + 6, i));
        }
        let netlist = Netlist::parse(&text).unwrap();
        assert!(orbit_size(&netlist) > 1_000_000_000);
        let head: Vec<String> = enumerate_signatures(&netlist).take(5).collect();
        assert_eq!(head.len(), 5);
        assert_eq!(head[0], netlist.to_text());
    }

    #[test]
    fn test_relabeled_netlists_are_isomorphic() {
        let lhs = Netlist::parse(NAND2).unwrap();
        let rhs = Netlist::parse(NAND2_RELABELED).unwrap();
        assert!(is_isomorphic(&lhs, &rhs));
        assert!(is_isomorphic(&rhs, &lhs));
        assert_eq!(canonical_signature(&lhs), canonical_signature(&rhs));
    }

    #[test]
    fn test_same_shape_different_structure_is_not_isomorphic() {
        let nand = Netlist::parse(NAND2).unwrap();
        let nor = Netlist::parse(NOR2).unwrap();
        assert_eq!(nand.shape(), nor.shape());
        assert!(!is_isomorphic(&nand, &nor));
        assert_ne!(canonical_signature(&nand), canonical_signature(&nor));
    }

    #[test]
    fn test_different_counts_are_never_isomorphic() {
        let inv = Netlist::parse(INVERTER).unwrap();
        let nand = Netlist::parse(NAND2).unwrap();
        assert!(!is_isomorphic(&inv, &nand));
        assert!(!is_isomorphic(&nand, &inv));
    }

    #[test]
    fn test_canonical_signature_is_orbit_minimum_and_stable() {
        let netlist = Netlist::parse(NAND2).unwrap();
        let canon = canonical_signature(&netlist);
        assert!(enumerate_signatures(&netlist).all(|s| canon <= s));
        let reparsed = Netlist::parse(&canon).unwrap();
        assert_eq!(canonical_signature(&reparsed), canon);
    }
}
