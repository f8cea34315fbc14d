//! Moment indices and their polynomial combinations.
//!
//! A [`MomentIndex`] is an exponent tuple `(a_1, ..., a_d)` naming the
//! moment `sum_i f_i * c_i1^a_1 * ... * c_id^a_d`. A
//! [`PolynomialMomentIndex`] is a rational linear combination of such
//! tuples, naming the moment of a polynomial in the velocity components.
//!
//! # Key equivalence
//!
//! [`Index`] is the map key used throughout the crate. A polynomial index
//! with exactly one term and coefficient 1 compares and hashes equal to the
//! bare monomial index it wraps, so results stored under either form are
//! found under the other.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

use crate::error::{Error, Result};

/// Exponent tuple of a monomial moment.
///
/// Ordered lexicographically by exponents.
///
/// # Examples
/// ```
/// use u_cumulants::MomentIndex;
/// let idx = MomentIndex::from([2, 0, 1]);
/// assert_eq!(idx.dim(), 3);
/// assert_eq!(idx.order(), 3);
/// assert_eq!(idx.symbol_name("m"), "m_2_0_1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MomentIndex {
    exponents: Vec<u32>,
}

impl MomentIndex {
    /// Creates an index from its exponents.
    pub fn new(exponents: impl Into<Vec<u32>>) -> Self {
        Self {
            exponents: exponents.into(),
        }
    }

    /// The all-zero index of dimension `dim`.
    pub fn zero(dim: usize) -> Self {
        Self::new(vec![0; dim])
    }

    /// The index with a single 1 at `axis`.
    ///
    /// # Panics
    /// Panics if `axis >= dim`.
    pub fn unit(dim: usize, axis: usize) -> Self {
        let mut exponents = vec![0; dim];
        exponents[axis] = 1;
        Self::new(exponents)
    }

    /// Number of components.
    pub fn dim(&self) -> usize {
        self.exponents.len()
    }

    /// Sum of exponents.
    pub fn order(&self) -> u32 {
        self.exponents.iter().sum()
    }

    /// The exponents.
    pub fn exponents(&self) -> &[u32] {
        &self.exponents
    }

    /// Wraps this index as a single-term combination with coefficient 1.
    pub fn embed(&self) -> PolynomialMomentIndex {
        let mut terms = BTreeMap::new();
        terms.insert(self.clone(), BigRational::one());
        PolynomialMomentIndex { terms }
    }

    /// Componentwise `self <= other`.
    pub fn is_dominated_by(&self, other: &MomentIndex) -> bool {
        self.dim() == other.dim()
            && self
                .exponents
                .iter()
                .zip(&other.exponents)
                .all(|(a, b)| a <= b)
    }

    /// All indices componentwise `<=` this one, lexicographically ordered.
    pub fn lower_box(&self) -> Vec<MomentIndex> {
        let mut out = Vec::new();
        let mut current = vec![0; self.dim()];
        loop {
            out.push(MomentIndex::new(current.clone()));
            // Odometer increment, last component fastest.
            let mut k = self.dim();
            loop {
                if k == 0 {
                    return out;
                }
                k -= 1;
                if current[k] < self.exponents[k] {
                    current[k] += 1;
                    break;
                }
                current[k] = 0;
            }
        }
    }

    /// `prod_k a_k!`, the normalization between Taylor coefficients and
    /// moments.
    pub fn factorial_weight(&self) -> BigInt {
        self.exponents
            .iter()
            .map(|&a| factorial(a))
            .fold(BigInt::one(), |acc, f| acc * f)
    }

    /// Default symbol name, e.g. `m_2_0` for prefix `m`.
    pub fn symbol_name(&self, prefix: &str) -> String {
        let mut name = prefix.to_string();
        for a in &self.exponents {
            name.push('_');
            name.push_str(&a.to_string());
        }
        name
    }
}

/// `n!` as an arbitrary-precision integer.
pub fn factorial(n: u32) -> BigInt {
    (2..=n).fold(BigInt::one(), |acc, k| acc * BigInt::from(k))
}

impl From<Vec<u32>> for MomentIndex {
    fn from(exponents: Vec<u32>) -> Self {
        Self::new(exponents)
    }
}

impl<const N: usize> From<[u32; N]> for MomentIndex {
    fn from(exponents: [u32; N]) -> Self {
        Self::new(exponents.to_vec())
    }
}

impl From<(u32, u32)> for MomentIndex {
    fn from((a, b): (u32, u32)) -> Self {
        Self::new(vec![a, b])
    }
}

impl From<(u32, u32, u32)> for MomentIndex {
    fn from((a, b, c): (u32, u32, u32)) -> Self {
        Self::new(vec![a, b, c])
    }
}

impl fmt::Display for MomentIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.exponents.iter().map(u32::to_string).collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// Enumerates every index of dimension `dim` with `order() <= max_order`.
///
/// Indices are returned in lexicographic order, so the sequence is stable
/// across calls and can be zipped with symbol lists.
///
/// # Examples
/// ```
/// use u_cumulants::index::enumerate_indices;
/// let idx = enumerate_indices(1, 2);
/// let tuples: Vec<Vec<u32>> = idx.iter().map(|i| i.exponents().to_vec()).collect();
/// assert_eq!(tuples, vec![vec![0, 0], vec![0, 1], vec![1, 0]]);
/// ```
pub fn enumerate_indices(max_order: u32, dim: usize) -> Vec<MomentIndex> {
    fn generate(
        remaining_dims: usize,
        remaining_order: u32,
        current: &mut Vec<u32>,
        out: &mut Vec<MomentIndex>,
    ) {
        if remaining_dims == 0 {
            out.push(MomentIndex::new(current.clone()));
            return;
        }
        for a in 0..=remaining_order {
            current.push(a);
            generate(remaining_dims - 1, remaining_order - a, current, out);
            current.pop();
        }
    }

    let mut out = Vec::new();
    generate(dim, max_order, &mut Vec::with_capacity(dim), &mut out);
    out
}

/// Enumerates every index of dimension `dim` whose components are all
/// `<= max_component`, in lexicographic order.
///
/// For `max_component = 2` this yields the 9 (d=2) or 27 (d=3) indices
/// matching the velocity count of a full `{-1, 0, 1}^d` stencil.
pub fn moments_up_to_component_order(max_component: u32, dim: usize) -> Vec<MomentIndex> {
    MomentIndex::new(vec![max_component; dim]).lower_box()
}

/// Rational linear combination of monomial indices.
///
/// Invariants: at least one term, all terms share one dimension, no zero
/// coefficients.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolynomialMomentIndex {
    terms: BTreeMap<MomentIndex, BigRational>,
}

impl PolynomialMomentIndex {
    /// Builds a combination, summing repeated indices and dropping zero
    /// coefficients.
    ///
    /// # Errors
    /// - [`Error::DimensionMismatch`] if terms differ in dimension.
    /// - [`Error::DegenerateIndex`] if no nonzero term remains.
    pub fn from_terms<I, M>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = (M, BigRational)>,
        M: Into<MomentIndex>,
    {
        let mut merged: BTreeMap<MomentIndex, BigRational> = BTreeMap::new();
        let mut dim = None;
        for (index, coeff) in terms {
            let index = index.into();
            match dim {
                None => dim = Some(index.dim()),
                Some(d) if d != index.dim() => {
                    return Err(Error::DimensionMismatch {
                        expected: d,
                        found: index.dim(),
                    });
                }
                Some(_) => {}
            }
            *merged.entry(index).or_insert_with(BigRational::zero) += coeff;
        }
        merged.retain(|_, c| !c.is_zero());
        if merged.is_empty() {
            return Err(Error::DegenerateIndex(
                "polynomial index has no nonzero terms".to_string(),
            ));
        }
        Ok(Self { terms: merged })
    }

    /// Shorthand for [`from_terms`](Self::from_terms) with integer coefficients.
    ///
    /// # Errors
    /// As for [`from_terms`](Self::from_terms).
    pub fn from_integer_terms<I, M>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = (M, i64)>,
        M: Into<MomentIndex>,
    {
        Self::from_terms(
            terms
                .into_iter()
                .map(|(m, c)| (m, BigRational::from_integer(BigInt::from(c)))),
        )
    }

    /// Dimension shared by all terms.
    pub fn dim(&self) -> usize {
        self.terms.keys().next().map_or(0, MomentIndex::dim)
    }

    /// Highest order among the terms.
    pub fn order(&self) -> u32 {
        self.terms.keys().map(MomentIndex::order).max().unwrap_or(0)
    }

    /// Iterates over `(index, coefficient)` pairs in index order.
    pub fn terms(&self) -> impl Iterator<Item = (&MomentIndex, &BigRational)> {
        self.terms.iter()
    }

    /// Coefficient of `index`, if present.
    pub fn coefficient(&self, index: &MomentIndex) -> Option<&BigRational> {
        self.terms.get(index)
    }

    /// The wrapped monomial if this is a single term with coefficient 1.
    pub fn as_monomial(&self) -> Option<&MomentIndex> {
        if self.terms.len() != 1 {
            return None;
        }
        self.terms
            .iter()
            .next()
            .filter(|(_, c)| c.is_one())
            .map(|(m, _)| m)
    }
}

impl fmt::Display for PolynomialMomentIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (m, c)) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            if c.is_one() {
                write!(f, "{m}")?;
            } else {
                write!(f, "{c}*{m}")?;
            }
        }
        Ok(())
    }
}

/// A requested index: a bare monomial or a polynomial combination.
///
/// Equality and hashing go through [`Index::as_monomial`], so
/// `Index::Polynomial(m.embed())` and `Index::Monomial(m)` are the same key.
///
/// # Examples
/// ```
/// use u_cumulants::{Index, MomentIndex};
/// let bare = MomentIndex::from((1, 1));
/// assert_eq!(Index::from(bare.clone()), Index::from(bare.embed()));
/// ```
#[derive(Debug, Clone)]
pub enum Index {
    /// A single exponent tuple.
    Monomial(MomentIndex),
    /// A rational combination of exponent tuples.
    Polynomial(PolynomialMomentIndex),
}

impl Index {
    /// The monomial this key stands for, if it is one.
    pub fn as_monomial(&self) -> Option<&MomentIndex> {
        match self {
            Index::Monomial(m) => Some(m),
            Index::Polynomial(p) => p.as_monomial(),
        }
    }

    /// Number of components.
    pub fn dim(&self) -> usize {
        match self {
            Index::Monomial(m) => m.dim(),
            Index::Polynomial(p) => p.dim(),
        }
    }

    /// Order of the monomial, or highest term order of the combination.
    pub fn order(&self) -> u32 {
        match self {
            Index::Monomial(m) => m.order(),
            Index::Polynomial(p) => p.order(),
        }
    }

    /// The `(index, coefficient)` terms; a monomial yields one term with
    /// coefficient 1.
    pub fn terms(&self) -> Vec<(MomentIndex, BigRational)> {
        match self {
            Index::Monomial(m) => vec![(m.clone(), BigRational::one())],
            Index::Polynomial(p) => p.terms().map(|(m, c)| (m.clone(), c.clone())).collect(),
        }
    }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_monomial(), other.as_monomial()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => match (self, other) {
                (Index::Polynomial(a), Index::Polynomial(b)) => a == b,
                _ => false,
            },
            _ => false,
        }
    }
}

impl Eq for Index {}

impl Hash for Index {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match (self.as_monomial(), self) {
            (Some(m), _) => {
                0u8.hash(state);
                m.hash(state);
            }
            (None, Index::Polynomial(p)) => {
                1u8.hash(state);
                p.hash(state);
            }
            (None, Index::Monomial(m)) => {
                0u8.hash(state);
                m.hash(state);
            }
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::Monomial(m) => write!(f, "{m}"),
            Index::Polynomial(p) => write!(f, "{p}"),
        }
    }
}

impl From<MomentIndex> for Index {
    fn from(index: MomentIndex) -> Self {
        Index::Monomial(index)
    }
}

impl From<&MomentIndex> for Index {
    fn from(index: &MomentIndex) -> Self {
        Index::Monomial(index.clone())
    }
}

impl From<PolynomialMomentIndex> for Index {
    fn from(index: PolynomialMomentIndex) -> Self {
        Index::Polynomial(index)
    }
}

impl From<&PolynomialMomentIndex> for Index {
    fn from(index: &PolynomialMomentIndex) -> Self {
        Index::Polynomial(index.clone())
    }
}

impl From<&Index> for Index {
    fn from(index: &Index) -> Self {
        index.clone()
    }
}

impl<const N: usize> From<[u32; N]> for Index {
    fn from(exponents: [u32; N]) -> Self {
        Index::Monomial(MomentIndex::from(exponents))
    }
}

impl From<(u32, u32)> for Index {
    fn from(exponents: (u32, u32)) -> Self {
        Index::Monomial(MomentIndex::from(exponents))
    }
}

impl From<(u32, u32, u32)> for Index {
    fn from(exponents: (u32, u32, u32)) -> Self {
        Index::Monomial(MomentIndex::from(exponents))
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::hash_map::DefaultHasher;

    fn index_strategy() -> impl Strategy<Value = MomentIndex> {
        (1_usize..=3).prop_flat_map(|d| proptest::collection::vec(0_u32..4, d).prop_map(MomentIndex::new))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn embedding_is_interchangeable_key(idx in index_strategy()) {
            let bare = Index::from(idx.clone());
            let embedded = Index::from(idx.embed());
            prop_assert_eq!(&bare, &embedded);
            let mut h1 = DefaultHasher::new();
            let mut h2 = DefaultHasher::new();
            bare.hash(&mut h1);
            embedded.hash(&mut h2);
            prop_assert_eq!(h1.finish(), h2.finish());
        }

        #[test]
        fn lower_box_size_is_product(idx in index_strategy()) {
            let expected: usize = idx.exponents().iter().map(|&a| a as usize + 1).product();
            let boxed = idx.lower_box();
            prop_assert_eq!(boxed.len(), expected);
            prop_assert!(boxed.iter().all(|b| b.is_dominated_by(&idx)));
        }

        #[test]
        fn enumeration_matches_filter(n in 0_u32..4, d in 1_usize..=3) {
            let all = moments_up_to_component_order(n, d);
            let filtered: Vec<MomentIndex> = all.into_iter().filter(|i| i.order() <= n).collect();
            prop_assert_eq!(enumerate_indices(n, d), filtered);
        }
    }
}
