// SPDX-License-Identifier: Apache-2.0

//! Boolean-function signatures ("BSF") and their unified form.
//!
//! A raw signature is the truth table of a cell's output written as a string
//! of `'0'`/`'1'` characters of length `2^n`. Character `i` is the output for
//! the assignment in which input `j` takes the value of bit `j` of `i`, so
//! input 0 toggles fastest.
//!
//! Unification drops the inputs the function does not depend on and then
//! picks the lexicographically smallest string over all input orderings.
//! Constant functions unify to `"0"` or `"1"`, and a raw signature longer
//! than its unified form has redundant inputs.

use itertools::Itertools;

use crate::cleanup_error::{CleanupError, CleanupResult};

/// Largest input count accepted by `TruthTable::parse`.
pub const MAX_VARS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TruthTable {
    var_count: usize,
    bits: Vec<bool>,
}

impl TruthTable {
    pub fn parse(signature: &str) -> CleanupResult<Self> {
        let malformed = |reason: String| CleanupError::MalformedSignature {
            signature: signature.to_string(),
            reason,
        };
        let len = signature.len();
        if len == 0 || !len.is_power_of_two() {
            return Err(malformed(format!("length {} is not a power of two", len)));
        }
        let var_count = len.trailing_zeros() as usize;
        if var_count > MAX_VARS {
            return Err(malformed(format!(
                "{} inputs exceeds the maximum of {}",
                var_count, MAX_VARS
            )));
        }
        let bits = signature
            .chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                _ => Err(malformed(format!("unexpected character {:?}", c))),
            })
            .collect::<CleanupResult<Vec<bool>>>()?;
        Ok(Self { var_count, bits })
    }

    pub fn var_count(&self) -> usize {
        self.var_count
    }

    pub fn get(&self, assignment: usize) -> bool {
        self.bits[assignment]
    }

    pub fn constant_value(&self) -> Option<bool> {
        let first = self.bits[0];
        self.bits.iter().all(|b| *b == first).then_some(first)
    }

    /// True if flipping input `var` changes the output for some assignment.
    pub fn depends_on(&self, var: usize) -> bool {
        let flip = 1usize << var;
        (0..self.bits.len()).any(|x| self.bits[x] != self.bits[x ^ flip])
    }

    pub fn support(&self) -> Vec<usize> {
        (0..self.var_count).filter(|v| self.depends_on(*v)).collect()
    }

    /// Restricts the function to its support; the remaining inputs keep their
    /// relative order.
    pub fn project_support(&self) -> TruthTable {
        let support = self.support();
        let bits = (0..1usize << support.len())
            .map(|y| {
                let x = support
                    .iter()
                    .enumerate()
                    .filter(|(k, _)| (y >> k) & 1 != 0)
                    .fold(0usize, |acc, (_, &var)| acc | (1 << var));
                self.bits[x]
            })
            .collect();
        TruthTable {
            var_count: support.len(),
            bits,
        }
    }

    /// Reorders inputs: new input `i` drives original input `perm[i]`.
    pub fn permute(&self, perm: &[usize]) -> TruthTable {
        debug_assert_eq!(perm.len(), self.var_count);
        let bits = (0..self.bits.len())
            .map(|y| {
                let x = perm
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| (y >> i) & 1 != 0)
                    .fold(0usize, |acc, (_, &orig)| acc | (1 << orig));
                self.bits[x]
            })
            .collect();
        TruthTable {
            var_count: self.var_count,
            bits,
        }
    }

    /// Support-reduced, input-order-canonical form.
    pub fn unified(&self) -> TruthTable {
        let projected = self.project_support();
        let n = projected.var_count;
        (0..n)
            .permutations(n)
            .map(|perm| projected.permute(&perm))
            .min_by(|a, b| a.bits.cmp(&b.bits))
            .unwrap_or(projected)
    }
}

impl std::fmt::Display for TruthTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for bit in &self.bits {
            write!(f, "{}", if *bit { '1' } else { '0' })?;
        }
        Ok(())
    }
}

/// Unifies a raw signature string.
pub fn unify(raw: &str) -> CleanupResult<String> {
    Ok(TruthTable::parse(raw)?.unified().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(""; "empty")]
    #[test_case("101"; "not a power of two")]
    #[test_case("01x1"; "bad character")]
    fn test_parse_rejects(signature: &str) {
        assert!(matches!(
            TruthTable::parse(signature),
            Err(CleanupError::MalformedSignature { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_too_many_inputs() {
        let signature = "0".repeat(1 << (MAX_VARS + 1));
        assert!(TruthTable::parse(&signature).is_err());
    }

    #[test_case("0000", "0"; "const0")]
    #[test_case("1111", "1"; "const1")]
    #[test_case("10", "10"; "inverter")]
    #[test_case("1110", "1110"; "nand2")]
    #[test_case("1010", "10"; "inverter with unused second input")]
    #[test_case("11001100", "10"; "inverter of the middle input")]
    fn test_unify(raw: &str, want: &str) {
        assert_eq!(unify(raw).unwrap(), want);
    }

    #[test]
    fn test_unify_is_input_order_invariant() {
        // I0 & !I1 versus I1 & !I0.
        assert_eq!(unify("0100").unwrap(), "0010");
        assert_eq!(unify("0010").unwrap(), "0010");
    }

    #[test]
    fn test_support_and_dependence() {
        let tt = TruthTable::parse("11001100").unwrap();
        assert_eq!(tt.var_count(), 3);
        assert!(!tt.depends_on(0));
        assert!(tt.depends_on(1));
        assert!(!tt.depends_on(2));
        assert_eq!(tt.support(), vec![1]);
        assert_eq!(tt.constant_value(), None);
        assert_eq!(TruthTable::parse("11").unwrap().constant_value(), Some(true));
    }

    #[test]
    fn test_permute_swaps_inputs() {
        let tt = TruthTable::parse("0100").unwrap();
        assert_eq!(tt.permute(&[1, 0]).to_string(), "0010");
        assert_eq!(tt.permute(&[0, 1]), tt);
    }
}
