//! Truncated multivariate power series and coefficient extraction.
//!
//! # Algorithm
//!
//! A generating function is expanded into a dense table of Taylor
//! coefficients over the box `{a : a <= bound}` (componentwise). Products
//! discard every term outside the box, which is exact for all coefficients
//! inside it because exponents only ever add.
//!
//! - `exp(e . x)` has coefficient `prod_k e_k^{a_k} / a_k!` at `x^a`.
//! - `log S = log s0 + sum_{n>=1} (-1)^{n+1} / n * (R / s0)^n` where
//!   `S = s0 + R` and `R` has no constant term.
//! - `exp S = exp(s0) * sum_{n>=0} R^n / n!`.
//!
//! Both sums stop at `n = |bound|`, since `R^n` starts at order `n`.
//! The constant term of `log S` is the closed form `log(s0)`. Extraction
//! at order 0 skips the expansion and uses
//! [`GeneratingFunction::value_at_origin`], so order-0 cumulants come out as
//! `log(sum_i f_i)`.
//!
//! # Complexity
//! With `B = prod_k (bound_k + 1)` box entries, a product costs `O(B^2)`
//! expression multiplications and a logarithm or exponential `O(|bound| B^2)`.

use std::ops::{AddAssign, Mul};

use num_bigint::BigInt;
use num_rational::BigRational;

use crate::error::{Error, Result};
use crate::generating::GeneratingFunction;
use crate::index::{factorial, Index, MomentIndex};
use crate::symbolic::Expr;

/// Taylor coefficients of a series over a box of exponent tuples.
///
/// Coefficients are stored in the order of [`MomentIndex::lower_box`] of the
/// bound (last component fastest).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncatedSeries {
    bound: MomentIndex,
    coefficients: Vec<Expr>,
}

impl TruncatedSeries {
    /// The zero series.
    pub fn zero(bound: MomentIndex) -> Self {
        let len: usize = bound
            .exponents()
            .iter()
            .map(|&b| b as usize + 1)
            .product();
        Self {
            bound,
            coefficients: vec![Expr::zero(); len],
        }
    }

    /// The constant series `value`.
    pub fn constant(bound: MomentIndex, value: Expr) -> Self {
        let mut series = Self::zero(bound);
        series.coefficients[0] = value;
        series
    }

    /// Expansion of `exp(exponents . x)`.
    pub fn exponential_of_linear(bound: MomentIndex, exponents: &[Expr]) -> Self {
        debug_assert_eq!(exponents.len(), bound.dim());
        // powers[k][p] = e_k^p / p!
        let powers: Vec<Vec<Expr>> = exponents
            .iter()
            .zip(bound.exponents())
            .map(|(e, &b)| {
                let mut row = Vec::with_capacity(b as usize + 1);
                let mut current = Expr::one();
                for p in 0..=b {
                    if p > 0 {
                        current = &current * e;
                    }
                    row.push(current.scale(&inverse_factorial(p)));
                }
                row
            })
            .collect();
        let coefficients = bound
            .lower_box()
            .iter()
            .map(|a| {
                a.exponents()
                    .iter()
                    .zip(&powers)
                    .map(|(&ak, row)| row[ak as usize].clone())
                    .product::<Expr>()
            })
            .collect();
        Self {
            bound,
            coefficients,
        }
    }

    /// Upper corner of the coefficient box.
    pub fn bound(&self) -> &MomentIndex {
        &self.bound
    }

    /// Taylor coefficient at `x^index`; zero outside the box.
    pub fn coefficient(&self, index: &MomentIndex) -> Expr {
        self.position(index)
            .map(|p| self.coefficients[p].clone())
            .unwrap_or_default()
    }

    /// Multiplies every coefficient by `factor`.
    pub fn scaled(&self, factor: &Expr) -> Self {
        Self {
            bound: self.bound.clone(),
            coefficients: self.coefficients.iter().map(|c| c * factor).collect(),
        }
    }

    /// Splits into the constant term and the remainder.
    pub fn split_constant(&self) -> (Expr, Self) {
        let mut rest = self.clone();
        let constant = std::mem::take(&mut rest.coefficients[0]);
        (constant, rest)
    }

    /// Natural logarithm.
    ///
    /// # Errors
    /// Returns [`Error::SingularExpression`] if the constant term is `0`.
    pub fn ln(&self) -> Result<Self> {
        let (s0, rest) = self.split_constant();
        let mut out = Self::constant(self.bound.clone(), s0.ln()?);
        let ratio = rest.scaled(&s0.recip()?);
        let order = self.bound.order();
        let mut power = ratio.clone();
        for n in 1..=order {
            let sign = if n % 2 == 1 { 1 } else { -1 };
            let weight = BigRational::new(BigInt::from(sign), BigInt::from(n));
            out += &power.scaled(&Expr::rational(weight));
            if n < order {
                power = &power * &ratio;
            }
        }
        Ok(out)
    }

    /// Exponential.
    pub fn exp(&self) -> Self {
        let (s0, rest) = self.split_constant();
        let mut total = Self::constant(self.bound.clone(), Expr::one());
        let mut term = total.clone();
        for n in 1..=self.bound.order() {
            // term = R^n / n!
            term = (&term * &rest).scaled(&Expr::ratio(1, i64::from(n)));
            total += &term;
        }
        total.scaled(&s0.exp())
    }

    fn position(&self, index: &MomentIndex) -> Option<usize> {
        if !index.is_dominated_by(&self.bound) {
            return None;
        }
        Some(
            index
                .exponents()
                .iter()
                .zip(self.bound.exponents())
                .fold(0, |pos, (&a, &b)| pos * (b as usize + 1) + a as usize),
        )
    }
}

impl AddAssign<&TruncatedSeries> for TruncatedSeries {
    fn add_assign(&mut self, other: &TruncatedSeries) {
        debug_assert_eq!(self.bound, other.bound);
        for (c, o) in self.coefficients.iter_mut().zip(&other.coefficients) {
            if !o.is_zero() {
                *c = &*c + o;
            }
        }
    }
}

impl Mul<&TruncatedSeries> for &TruncatedSeries {
    type Output = TruncatedSeries;

    fn mul(self, other: &TruncatedSeries) -> TruncatedSeries {
        debug_assert_eq!(self.bound, other.bound);
        let indices = self.bound.lower_box();
        let mut out = TruncatedSeries::zero(self.bound.clone());
        for (a, ca) in indices.iter().zip(&self.coefficients) {
            if ca.is_zero() {
                continue;
            }
            for (b, cb) in indices.iter().zip(&other.coefficients) {
                if cb.is_zero() {
                    continue;
                }
                let sum = MomentIndex::new(
                    a.exponents()
                        .iter()
                        .zip(b.exponents())
                        .map(|(x, y)| x + y)
                        .collect::<Vec<_>>(),
                );
                if let Some(p) = out.position(&sum) {
                    out.coefficients[p] = &out.coefficients[p] + &(ca * cb);
                }
            }
        }
        out
    }
}

fn inverse_factorial(n: u32) -> BigRational {
    BigRational::new(BigInt::from(1), factorial(n))
}

/// Componentwise maximum of a non-empty set of same-dimension indices.
pub(crate) fn join_bound<'a>(
    mut indices: impl Iterator<Item = &'a MomentIndex>,
) -> Option<MomentIndex> {
    let first = indices.next()?.exponents().to_vec();
    let joined = indices.fold(first, |mut acc, index| {
        for (a, &b) in acc.iter_mut().zip(index.exponents()) {
            *a = (*a).max(b);
        }
        acc
    });
    Some(MomentIndex::new(joined))
}

/// Expands `gf` over the box below `bound`.
///
/// # Errors
/// - [`Error::DimensionMismatch`] if `bound` and `gf` differ in dimension.
/// - [`Error::SingularExpression`] for the logarithm of a series with zero
///   constant term.
pub fn series_of(gf: &GeneratingFunction, bound: &MomentIndex) -> Result<TruncatedSeries> {
    if bound.dim() != gf.dim() {
        return Err(Error::DimensionMismatch {
            expected: gf.dim(),
            found: bound.dim(),
        });
    }
    match gf {
        GeneratingFunction::Discrete { terms, .. } => {
            let mut out = TruncatedSeries::zero(bound.clone());
            for (weight, exponents) in terms {
                out += &TruncatedSeries::exponential_of_linear(bound.clone(), exponents)
                    .scaled(weight);
            }
            Ok(out)
        }
        GeneratingFunction::Formal { coefficients, .. } => {
            let mut out = TruncatedSeries::zero(bound.clone());
            for (index, value) in coefficients {
                if let Some(p) = out.position(index) {
                    let weight = BigRational::new(BigInt::from(1), index.factorial_weight());
                    out.coefficients[p] = value.scale(&weight);
                }
            }
            Ok(out)
        }
        GeneratingFunction::Log(inner) => series_of(inner, bound)?.ln(),
        GeneratingFunction::Exp(inner) => Ok(series_of(inner, bound)?.exp()),
    }
}

/// `a! * [x^a] gf`: the moment or cumulant of multi-index `a`.
///
/// # Errors
/// As for [`series_of`].
///
/// # Examples
/// ```
/// use u_cumulants::{formal_series, extract_coefficient, Expr, MomentIndex};
/// let gf = formal_series(1, [
///     (MomentIndex::from([0]), Expr::symbol("m_0")),
///     (MomentIndex::from([1]), Expr::symbol("m_1")),
/// ]).unwrap();
/// let mean = extract_coefficient(&gf.ln(), &MomentIndex::from([1])).unwrap();
/// let expected = &Expr::symbol("m_1") * &Expr::symbol("m_0").recip().unwrap();
/// assert_eq!(mean, expected);
/// ```
pub fn extract_coefficient(gf: &GeneratingFunction, index: &MomentIndex) -> Result<Expr> {
    Ok(extract_many(gf, std::slice::from_ref(index))?
        .pop()
        .unwrap_or_default())
}

/// Extracts several monomial coefficients from one shared expansion.
///
/// # Errors
/// As for [`series_of`], checked against every index.
pub fn extract_many(gf: &GeneratingFunction, indices: &[MomentIndex]) -> Result<Vec<Expr>> {
    if let Some(bad) = indices.iter().find(|i| i.dim() != gf.dim()) {
        return Err(Error::DimensionMismatch {
            expected: gf.dim(),
            found: bad.dim(),
        });
    }
    let Some(bound) = join_bound(indices.iter()) else {
        return Ok(Vec::new());
    };
    // Order 0 takes the closed form at the origin.
    let origin = if indices.iter().any(|i| i.order() == 0) {
        Some(gf.value_at_origin()?)
    } else {
        None
    };
    let series = if bound.order() > 0 {
        Some(series_of(gf, &bound)?)
    } else {
        None
    };
    Ok(indices
        .iter()
        .map(|index| match (&origin, &series) {
            (Some(value), _) if index.order() == 0 => value.clone(),
            (_, Some(series)) => {
                let weight = BigRational::from_integer(index.factorial_weight());
                series.coefficient(index).scale(&weight)
            }
            _ => Expr::zero(),
        })
        .collect())
}

/// Extracts a monomial or the matching linear combination of monomials.
///
/// # Errors
/// As for [`extract_many`].
pub fn extract_index(gf: &GeneratingFunction, index: &Index) -> Result<Expr> {
    let terms = index.terms();
    let monomials: Vec<MomentIndex> = terms.iter().map(|(m, _)| m.clone()).collect();
    let values = extract_many(gf, &monomials)?;
    Ok(terms
        .iter()
        .zip(values)
        .map(|((_, coeff), value)| value.scale(coeff))
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generating::{cumulant_generating_function, formal_series, moment_generating_function};
    use crate::stencil::{DistributionSymbols, Stencil};

    fn sym(name: &str) -> Expr {
        Expr::symbol(name)
    }

    fn moment_series_1d(max: u32) -> GeneratingFunction {
        formal_series(
            1,
            (0..=max).map(|a| (MomentIndex::from([a]), sym(&format!("m_{a}")))),
        )
        .unwrap()
    }

    // --- series arithmetic ---

    #[test]
    fn test_exponential_of_linear_coefficients() {
        let s = TruncatedSeries::exponential_of_linear(MomentIndex::from([3]), &[Expr::integer(2)]);
        assert_eq!(s.coefficient(&MomentIndex::from([0])), Expr::one());
        assert_eq!(s.coefficient(&MomentIndex::from([2])), Expr::integer(2));
        assert_eq!(s.coefficient(&MomentIndex::from([3])), Expr::ratio(4, 3));
        assert!(s.coefficient(&MomentIndex::from([4])).is_zero());
    }

    #[test]
    fn test_truncated_product() {
        let bound = MomentIndex::from((1, 1));
        let x = TruncatedSeries::exponential_of_linear(bound.clone(), &[Expr::one(), Expr::zero()]);
        let y = TruncatedSeries::exponential_of_linear(bound.clone(), &[Expr::zero(), Expr::one()]);
        let xy = &x * &y;
        let both = TruncatedSeries::exponential_of_linear(bound, &[Expr::one(), Expr::one()]);
        assert_eq!(xy, both);
    }

    #[test]
    fn test_exp_of_ln_is_identity() {
        let gf = moment_series_1d(3);
        let s = series_of(&gf, &MomentIndex::from([3])).unwrap();
        let round = s.ln().unwrap().exp();
        assert_eq!(round, s);
    }

    #[test]
    fn test_ln_of_zero_constant_is_singular() {
        let s = TruncatedSeries::zero(MomentIndex::from([2]));
        assert!(matches!(s.ln(), Err(Error::SingularExpression(_))));
    }

    // --- coefficient extraction ---

    #[test]
    fn test_second_cumulant_closed_form() {
        let gf = formal_series(
            2,
            [
                (MomentIndex::from((0, 0)), sym("m_0_0")),
                (MomentIndex::from((1, 0)), sym("m_1_0")),
                (MomentIndex::from((2, 0)), sym("m_2_0")),
            ],
        )
        .unwrap();
        let c20 = extract_coefficient(&gf.ln(), &MomentIndex::from((2, 0))).unwrap();
        let inv = sym("m_0_0").recip().unwrap();
        let expected = &(&sym("m_2_0") * &inv) - &(&sym("m_1_0").powu(2) * &inv.powu(2));
        assert_eq!(c20, expected);
    }

    #[test]
    fn test_raw_moment_from_d2q9() {
        let stencil = Stencil::full(2).unwrap();
        let f = DistributionSymbols::indexed("f", 9);
        let gf = moment_generating_function(&stencil, &f).unwrap();
        let m20 = extract_coefficient(&gf, &MomentIndex::from((2, 0))).unwrap();
        let expected: Expr = [1, 4, 5, 6, 7, 8]
            .iter()
            .map(|i| sym(&format!("f_{i}")))
            .sum();
        assert_eq!(m20, expected);
        let m00 = extract_coefficient(&gf, &MomentIndex::from((0, 0))).unwrap();
        assert_eq!(m00, f.total());
    }

    #[test]
    fn test_first_cumulant_is_mean() {
        let stencil = Stencil::full(2).unwrap();
        let f = DistributionSymbols::indexed("f", 9);
        let mgf = moment_generating_function(&stencil, &f).unwrap();
        let cgf = cumulant_generating_function(&stencil, &f).unwrap();
        let m10 = extract_coefficient(&mgf, &MomentIndex::from((1, 0))).unwrap();
        let c10 = extract_coefficient(&cgf, &MomentIndex::from((1, 0))).unwrap();
        assert!(c10.equivalent(&(&m10 * &f.total().recip().unwrap())));
    }

    #[test]
    fn test_zeroth_cumulant_is_log_mass() {
        let stencil = Stencil::full(2).unwrap();
        let f = DistributionSymbols::indexed("f", 9);
        let cgf = cumulant_generating_function(&stencil, &f).unwrap();
        let c00 = extract_coefficient(&cgf, &MomentIndex::from((0, 0))).unwrap();
        assert_eq!(c00, f.total().ln().unwrap());
    }

    #[test]
    fn test_order_zero_matches_value_at_origin() {
        let stencil = Stencil::full(2).unwrap();
        let f = DistributionSymbols::indexed("f", 9);
        let zero = MomentIndex::from((0, 0));
        let mgf = moment_generating_function(&stencil, &f).unwrap();
        let formal = formal_series(2, [(zero.clone(), sym("c_0_0"))]).unwrap();
        for gf in [mgf.clone(), mgf.ln(), formal.clone().exp()] {
            let closed = gf.value_at_origin().unwrap();
            assert_eq!(extract_coefficient(&gf, &zero).unwrap(), closed);
            let batch = extract_many(&gf, &[MomentIndex::from((1, 0)), zero.clone()]).unwrap();
            assert_eq!(batch[1], closed);
        }
        assert_eq!(
            extract_coefficient(&formal.exp(), &zero).unwrap(),
            sym("c_0_0").exp()
        );
    }

    #[test]
    fn test_extract_dimension_mismatch() {
        let gf = moment_series_1d(2);
        assert!(matches!(
            extract_coefficient(&gf, &MomentIndex::from((1, 0))),
            Err(Error::DimensionMismatch { expected: 1, found: 2 })
        ));
    }

    #[test]
    fn test_extract_polynomial_index_is_linear() {
        let gf = moment_series_1d(3).ln();
        let combo = crate::index::PolynomialMomentIndex::from_integer_terms([
            (MomentIndex::from([2]), 3),
            (MomentIndex::from([1]), -1),
        ])
        .unwrap();
        let value = extract_index(&gf, &Index::from(combo)).unwrap();
        let c2 = extract_coefficient(&gf, &MomentIndex::from([2])).unwrap();
        let c1 = extract_coefficient(&gf, &MomentIndex::from([1])).unwrap();
        assert_eq!(value, &c2.scale(&BigRational::from_integer(3.into())) - &c1);
    }

    #[test]
    fn test_box_size_does_not_change_coefficients() {
        let gf = moment_series_1d(4).ln();
        let small = extract_coefficient(&gf, &MomentIndex::from([2])).unwrap();
        let many = extract_many(&gf, &[MomentIndex::from([2]), MomentIndex::from([4])]).unwrap();
        assert_eq!(many[0], small);
    }
}
