//! Index-keyed result maps.

use indexmap::IndexMap;

use crate::index::Index;
use crate::symbolic::Expr;

/// Derived expressions keyed by the index objects the caller supplied, in
/// insertion order.
///
/// Keys keep the form they were inserted with, but lookup honors the
/// embedding equivalence: an entry stored under a bare monomial index is
/// found under its single-term polynomial form and vice versa.
///
/// # Examples
/// ```
/// use u_cumulants::{Expr, MomentIndex, TransformationResult};
/// let mut result = TransformationResult::new();
/// let idx = MomentIndex::from((1, 0));
/// result.insert(idx.clone(), Expr::symbol("c_1_0"));
/// assert_eq!(result.get(idx.embed()), Some(&Expr::symbol("c_1_0")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformationResult {
    entries: IndexMap<Index, Expr>,
}

impl TransformationResult {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, keeping the first key form (and position) if an
    /// equivalent key is already present.
    pub fn insert(&mut self, index: impl Into<Index>, value: Expr) -> Option<Expr> {
        self.entries.insert(index.into(), value)
    }

    /// Looks up an entry under any equivalent key form.
    pub fn get(&self, index: impl Into<Index>) -> Option<&Expr> {
        self.entries.get(&index.into())
    }

    /// Is there an entry under an equivalent key?
    pub fn contains(&self, index: impl Into<Index>) -> bool {
        self.entries.contains_key(&index.into())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the result empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, Index, Expr> {
        self.entries.iter()
    }

    /// Keys in insertion order, in the form they were inserted.
    pub fn keys(&self) -> indexmap::map::Keys<'_, Index, Expr> {
        self.entries.keys()
    }

    /// Values in insertion order.
    pub fn values(&self) -> indexmap::map::Values<'_, Index, Expr> {
        self.entries.values()
    }
}

impl<I: Into<Index>> FromIterator<(I, Expr)> for TransformationResult {
    fn from_iter<T: IntoIterator<Item = (I, Expr)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(i, e)| (i.into(), e)).collect(),
        }
    }
}

impl IntoIterator for TransformationResult {
    type Item = (Index, Expr);
    type IntoIter = indexmap::map::IntoIter<Index, Expr>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a TransformationResult {
    type Item = (&'a Index, &'a Expr);
    type IntoIter = indexmap::map::Iter<'a, Index, Expr>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{MomentIndex, PolynomialMomentIndex};

    #[test]
    fn test_lookup_under_both_forms() {
        let idx = MomentIndex::from((2, 0));
        let mut result = TransformationResult::new();
        result.insert(idx.embed(), Expr::symbol("x"));
        assert_eq!(result.get(&idx), Some(&Expr::symbol("x")));
        assert!(result.contains(idx));
    }

    #[test]
    fn test_equivalent_insert_keeps_first_key_form() {
        let idx = MomentIndex::from((1, 1));
        let mut result = TransformationResult::new();
        result.insert(idx.clone(), Expr::one());
        let previous = result.insert(idx.embed(), Expr::integer(2));
        assert_eq!(previous, Some(Expr::one()));
        assert_eq!(result.len(), 1);
        assert!(matches!(result.keys().next(), Some(Index::Monomial(_))));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let keys = [(0, 2), (1, 0), (0, 0)];
        let result: TransformationResult = keys
            .iter()
            .map(|&k| (MomentIndex::from(k), Expr::zero()))
            .collect();
        let order: Vec<Index> = result.keys().cloned().collect();
        let expected: Vec<Index> = keys.iter().map(|&k| Index::from(k)).collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_polynomial_key_distinct_from_terms() {
        let combo = PolynomialMomentIndex::from_integer_terms([
            (MomentIndex::from((2, 0)), 1),
            (MomentIndex::from((0, 2)), 1),
        ])
        .unwrap();
        let mut result = TransformationResult::new();
        result.insert(combo.clone(), Expr::one());
        assert!(result.contains(&combo));
        assert!(!result.contains(MomentIndex::from((2, 0))));
    }
}
