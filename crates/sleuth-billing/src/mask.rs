//! Boolean row selection over a [`Dataset`](crate::Dataset).
//!
//! Masks are combined with set operations so a row selected by several
//! filters is still a single row.

/// Selected rows of a dataset, one flag per record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMask {
    bits: Vec<bool>,
}

impl RowMask {
    /// Mask of `len` rows with nothing selected.
    pub fn none(len: usize) -> Self {
        Self {
            bits: vec![false; len],
        }
    }

    /// Mask of `len` rows with everything selected.
    pub fn all(len: usize) -> Self {
        Self {
            bits: vec![true; len],
        }
    }

    /// Build a mask by evaluating `f` for each row index.
    pub fn from_fn(len: usize, f: impl FnMut(usize) -> bool) -> Self {
        Self {
            bits: (0..len).map(f).collect(),
        }
    }

    /// Number of rows the mask covers (selected or not).
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// True when the mask covers no rows at all.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Number of selected rows.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    /// True when at least one row is selected.
    pub fn any(&self) -> bool {
        self.bits.iter().any(|b| *b)
    }

    pub fn contains(&self, row: usize) -> bool {
        self.bits.get(row).copied().unwrap_or(false)
    }

    pub fn set(&mut self, row: usize, selected: bool) {
        if let Some(bit) = self.bits.get_mut(row) {
            *bit = selected;
        }
    }

    /// Indices of selected rows, ascending.
    pub fn rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.then_some(i))
    }

    /// Rows selected by either mask.
    pub fn union(&self, other: &RowMask) -> RowMask {
        self.zip_with(other, |a, b| a || b)
    }

    /// Rows selected by both masks.
    pub fn intersection(&self, other: &RowMask) -> RowMask {
        self.zip_with(other, |a, b| a && b)
    }

    /// Rows selected by `self` but not by `other`.
    pub fn difference(&self, other: &RowMask) -> RowMask {
        self.zip_with(other, |a, b| a && !b)
    }

    /// Rows not selected by `self`.
    pub fn complement(&self) -> RowMask {
        Self {
            bits: self.bits.iter().map(|b| !b).collect(),
        }
    }

    /// In-place union, used when folding many masks.
    pub fn union_with(&mut self, other: &RowMask) {
        debug_assert_eq!(self.len(), other.len(), "masks cover different datasets");
        for (a, b) in self.bits.iter_mut().zip(&other.bits) {
            *a |= *b;
        }
    }

    fn zip_with(&self, other: &RowMask, op: impl Fn(bool, bool) -> bool) -> RowMask {
        debug_assert_eq!(self.len(), other.len(), "masks cover different datasets");
        Self {
            bits: self
                .bits
                .iter()
                .zip(&other.bits)
                .map(|(a, b)| op(*a, *b))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(bits: &[bool]) -> RowMask {
        RowMask::from_fn(bits.len(), |i| bits[i])
    }

    #[test]
    fn test_set_operations() {
        let a = mask(&[true, true, false, false]);
        let b = mask(&[false, true, true, false]);

        assert_eq!(a.union(&b), mask(&[true, true, true, false]));
        assert_eq!(a.intersection(&b), mask(&[false, true, false, false]));
        assert_eq!(a.difference(&b), mask(&[true, false, false, false]));
        assert_eq!(a.complement(), mask(&[false, false, true, true]));
    }

    #[test]
    fn test_union_with_counts_overlap_once() {
        let mut acc = RowMask::none(3);
        acc.union_with(&mask(&[true, true, false]));
        acc.union_with(&mask(&[true, true, false]));
        assert_eq!(acc.count(), 2);
        assert_eq!(acc.rows().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_bounds() {
        let mut m = RowMask::none(2);
        assert!(!m.any());
        m.set(1, true);
        m.set(5, true);
        assert!(m.contains(1));
        assert!(!m.contains(5));
        assert!(RowMask::all(0).is_empty());
        assert_eq!(RowMask::all(4).count(), 4);
    }
}
