//! Exact symbolic expressions.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::iter::{Product, Sum};
use std::ops::{Add, Mul, Neg, Sub};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

use super::monomial::{Atom, Monomial, Symbol};
use crate::error::{Error, Result};

/// An exact expression: a sum of rational-coefficient monomials.
///
/// # Canonical form
/// Terms are keyed by [`Monomial`] in a `BTreeMap`, zero coefficients are
/// never stored, and [`Atom::Group`] factors only carry negative exponents
/// (a positive power of a group is multiplied out on construction). Two
/// expressions built from the same polynomial arithmetic therefore compare
/// equal with `==`. Expressions that agree only after cancelling a group
/// denominator are recognized by [`Expr::is_identically_zero`].
///
/// # Examples
/// ```
/// use u_cumulants::symbolic::Expr;
/// let x = Expr::symbol("x");
/// let y = Expr::symbol("y");
/// let lhs = (&x + &y) * (&x - &y);
/// let rhs = &x * &x - &y * &y;
/// assert_eq!(lhs, rhs);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Expr {
    terms: BTreeMap<Monomial, BigRational>,
}

impl Expr {
    /// The literal constant `0`.
    pub fn zero() -> Self {
        Self::default()
    }

    /// The literal constant `1`.
    pub fn one() -> Self {
        Self::rational(BigRational::one())
    }

    /// An integer constant.
    pub fn integer(n: i64) -> Self {
        Self::rational(BigRational::from_integer(BigInt::from(n)))
    }

    /// The rational constant `numer / denom`.
    ///
    /// # Panics
    /// Panics if `denom == 0`.
    pub fn ratio(numer: i64, denom: i64) -> Self {
        Self::rational(BigRational::new(BigInt::from(numer), BigInt::from(denom)))
    }

    /// A rational constant.
    pub fn rational(value: BigRational) -> Self {
        Self::term(value, Monomial::one())
    }

    /// A single symbol.
    pub fn symbol(name: impl AsRef<str>) -> Self {
        Self::from(Symbol::new(name))
    }

    /// `coeff * monomial`, with group factors normalized.
    pub fn term(coeff: BigRational, monomial: Monomial) -> Self {
        let mut out = Self::zero();
        out.push_term(coeff, monomial);
        out
    }

    fn from_atom(atom: Atom) -> Self {
        Self::term(BigRational::one(), Monomial::atom(atom))
    }

    /// Is this the literal constant `0`?
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Is this the literal constant `1`?
    pub fn is_one(&self) -> bool {
        self.as_constant().is_some_and(|c| c.is_one())
    }

    /// Returns the value if this expression is a constant.
    pub fn as_constant(&self) -> Option<BigRational> {
        if self.is_zero() {
            return Some(BigRational::zero());
        }
        match self.single_term() {
            Some((m, c)) if m.is_one() => Some(c.clone()),
            _ => None,
        }
    }

    /// Returns the symbol if this expression is exactly one symbol.
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self.single_term() {
            Some((m, c)) if c.is_one() => match m.powers() {
                [(Atom::Symbol(s), 1)] => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    fn single_term(&self) -> Option<(&Monomial, &BigRational)> {
        if self.terms.len() == 1 {
            self.terms.iter().next()
        } else {
            None
        }
    }

    fn single_atom(&self) -> Option<&Atom> {
        match self.single_term() {
            Some((m, c)) if c.is_one() => match m.powers() {
                [(atom, 1)] => Some(atom),
                _ => None,
            },
            _ => None,
        }
    }

    /// Number of stored terms.
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Iterates over `(monomial, coefficient)` pairs in canonical order.
    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, &BigRational)> {
        self.terms.iter()
    }

    /// Coefficient of `monomial`, zero if absent.
    pub fn coefficient(&self, monomial: &Monomial) -> BigRational {
        self.terms.get(monomial).cloned().unwrap_or_else(BigRational::zero)
    }

    fn add_raw(&mut self, monomial: Monomial, coeff: BigRational) {
        let entry = self.terms.entry(monomial);
        match entry {
            std::collections::btree_map::Entry::Vacant(v) => {
                v.insert(coeff);
            }
            std::collections::btree_map::Entry::Occupied(mut o) => {
                *o.get_mut() += coeff;
                if o.get().is_zero() {
                    o.remove();
                }
            }
        }
    }

    fn push_term(&mut self, coeff: BigRational, monomial: Monomial) {
        if coeff.is_zero() {
            return;
        }
        match monomial.take_positive_group() {
            None => self.add_raw(monomial, coeff),
            Some((inner, p, rest)) => {
                // Positive powers of a group are multiplied out.
                let factor = Self::term(coeff, rest);
                let expanded = factor.mul_ref(&inner.powu(p.unsigned_abs()));
                for (m, c) in expanded.terms {
                    self.add_raw(m, c);
                }
            }
        }
    }

    fn add_ref(&self, other: &Expr) -> Expr {
        let mut out = self.clone();
        for (m, c) in &other.terms {
            out.add_raw(m.clone(), c.clone());
        }
        out
    }

    fn mul_ref(&self, other: &Expr) -> Expr {
        let mut out = Expr::zero();
        for (m1, c1) in &self.terms {
            for (m2, c2) in &other.terms {
                out.push_term(c1 * c2, m1.mul(m2));
            }
        }
        out
    }

    /// Multiplies every coefficient by `factor`.
    pub fn scale(&self, factor: &BigRational) -> Expr {
        if factor.is_zero() {
            return Expr::zero();
        }
        Expr {
            terms: self
                .terms
                .iter()
                .map(|(m, c)| (m.clone(), c * factor))
                .collect(),
        }
    }

    /// Raises to a nonnegative integer power by repeated squaring.
    pub fn powu(&self, n: u32) -> Expr {
        let mut result = Expr::one();
        let mut base = self.clone();
        let mut n = n;
        while n > 0 {
            if n & 1 == 1 {
                result = result.mul_ref(&base);
            }
            n >>= 1;
            if n > 0 {
                base = base.mul_ref(&base);
            }
        }
        result
    }

    /// Raises to an integer power.
    ///
    /// A single term is inverted factor by factor. A multi-term sum is
    /// divided by its leading coefficient and kept as a [`Atom::Group`]
    /// denominator.
    ///
    /// # Errors
    /// Returns [`Error::SingularExpression`] for a negative power of `0`.
    pub fn powi(&self, k: i32) -> Result<Expr> {
        if k >= 0 {
            return Ok(self.powu(k.unsigned_abs()));
        }
        if self.is_zero() {
            return Err(Error::SingularExpression(format!("0^{k}")));
        }
        if let Some((m, c)) = self.single_term() {
            return Ok(Expr::term(rational_powi(c, k), m.powi(k)));
        }
        let lead = self
            .terms
            .values()
            .next()
            .cloned()
            .unwrap_or_else(BigRational::one);
        let normalized = self.scale(&lead.recip());
        Ok(Expr::term(
            rational_powi(&lead, k),
            Monomial::new(vec![(Atom::Group(normalized), k)]),
        ))
    }

    /// Multiplicative inverse.
    ///
    /// # Errors
    /// Returns [`Error::SingularExpression`] if `self` is `0`.
    pub fn recip(&self) -> Result<Expr> {
        self.powi(-1)
    }

    /// Natural logarithm as a tagged node, with `log(1) = 0` and
    /// `log(exp(x)) = x`.
    ///
    /// # Errors
    /// Returns [`Error::SingularExpression`] if `self` is `0`.
    pub fn ln(&self) -> Result<Expr> {
        if self.is_zero() {
            return Err(Error::SingularExpression("log(0)".to_string()));
        }
        if self.is_one() {
            return Ok(Expr::zero());
        }
        if let Some(Atom::Exp(inner)) = self.single_atom() {
            return Ok(inner.clone());
        }
        Ok(Expr::from_atom(Atom::Log(self.clone())))
    }

    /// Exponential as a tagged node, with `exp(0) = 1` and `exp(log(x)) = x`.
    pub fn exp(&self) -> Expr {
        if self.is_zero() {
            return Expr::one();
        }
        if let Some(Atom::Log(inner)) = self.single_atom() {
            return inner.clone();
        }
        Expr::from_atom(Atom::Exp(self.clone()))
    }

    /// Replaces symbols simultaneously, re-simplifying function nodes.
    ///
    /// Symbols absent from `map` are left in place.
    ///
    /// # Errors
    /// Returns [`Error::SingularExpression`] if a substituted denominator or
    /// logarithm argument becomes `0`.
    pub fn substitute(&self, map: &HashMap<Symbol, Expr>) -> Result<Expr> {
        if map.is_empty() {
            return Ok(self.clone());
        }
        let mut out = Expr::zero();
        for (m, c) in &self.terms {
            let mut product = Expr::rational(c.clone());
            for (atom, p) in m.powers() {
                let value = match atom {
                    Atom::Symbol(s) => match map.get(s) {
                        Some(v) => v.clone(),
                        None => Expr::from(s.clone()),
                    },
                    Atom::Log(inner) => inner.substitute(map)?.ln()?,
                    Atom::Exp(inner) => inner.substitute(map)?.exp(),
                    Atom::Group(inner) => inner.substitute(map)?,
                };
                product = product.mul_ref(&value.powi(*p)?);
            }
            out = out.add_ref(&product);
        }
        Ok(out)
    }

    /// All symbols occurring anywhere in the expression.
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<Symbol>) {
        for m in self.terms.keys() {
            for (atom, _) in m.powers() {
                match atom {
                    Atom::Symbol(s) => {
                        out.insert(s.clone());
                    }
                    Atom::Log(e) | Atom::Exp(e) | Atom::Group(e) => e.collect_symbols(out),
                }
            }
        }
    }

    /// Multiplies through by every group denominator, repeatedly, until no
    /// top-level group remains.
    ///
    /// Expanding a cleared group exposes the groups nested in its payload,
    /// so each round lowers the nesting depth and the loop terminates. The
    /// result is zero exactly when `self` is zero as a rational function of
    /// its symbols and function nodes.
    pub fn clear_denominators(&self) -> Expr {
        let mut current = self.clone();
        while let Some(next) = current.clear_top_level_groups() {
            current = next;
        }
        current
    }

    /// One clearing round; `None` when there is no group to clear.
    fn clear_top_level_groups(&self) -> Option<Expr> {
        let mut depth: BTreeMap<&Expr, i32> = BTreeMap::new();
        for m in self.terms.keys() {
            for (atom, p) in m.powers() {
                if let Atom::Group(inner) = atom {
                    let d = depth.entry(inner).or_insert(0);
                    *d = (*d).max(-p);
                }
            }
        }
        if depth.is_empty() {
            return None;
        }
        let multiplier = Monomial::new(
            depth
                .into_iter()
                .map(|(inner, d)| (Atom::Group(inner.clone()), d))
                .collect(),
        );
        let mut out = Expr::zero();
        for (m, c) in &self.terms {
            out.push_term(c.clone(), m.mul(&multiplier));
        }
        Some(out)
    }

    /// Does the expression reduce to the literal constant `0`?
    pub fn is_identically_zero(&self) -> bool {
        self.is_zero() || self.clear_denominators().is_zero()
    }

    /// Do `self` and `other` denote the same rational function?
    pub fn equivalent(&self, other: &Expr) -> bool {
        (self - other).is_identically_zero()
    }
}

fn rational_powi(base: &BigRational, k: i32) -> BigRational {
    let magnitude = num_traits::pow(base.clone(), k.unsigned_abs() as usize);
    if k < 0 {
        magnitude.recip()
    } else {
        magnitude
    }
}

impl From<Symbol> for Expr {
    fn from(symbol: Symbol) -> Self {
        Expr::from_atom(Atom::Symbol(symbol))
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::integer(n)
    }
}

impl From<BigRational> for Expr {
    fn from(value: BigRational) -> Self {
        Expr::rational(value)
    }
}

impl Add<&Expr> for &Expr {
    type Output = Expr;
    fn add(self, rhs: &Expr) -> Expr {
        self.add_ref(rhs)
    }
}

impl Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        self.add_ref(&rhs)
    }
}

impl Sub<&Expr> for &Expr {
    type Output = Expr;
    fn sub(self, rhs: &Expr) -> Expr {
        self.add_ref(&-rhs)
    }
}

impl Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        &self - &rhs
    }
}

impl Mul<&Expr> for &Expr {
    type Output = Expr;
    fn mul(self, rhs: &Expr) -> Expr {
        self.mul_ref(rhs)
    }
}

impl Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        self.mul_ref(&rhs)
    }
}

impl Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr {
            terms: self.terms.iter().map(|(m, c)| (m.clone(), -c)).collect(),
        }
    }
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        -&self
    }
}

impl Sum for Expr {
    fn sum<I: Iterator<Item = Expr>>(iter: I) -> Expr {
        iter.fold(Expr::zero(), |acc, e| acc.add_ref(&e))
    }
}

impl<'a> Sum<&'a Expr> for Expr {
    fn sum<I: Iterator<Item = &'a Expr>>(iter: I) -> Expr {
        iter.fold(Expr::zero(), |acc, e| acc.add_ref(e))
    }
}

impl Product for Expr {
    fn product<I: Iterator<Item = Expr>>(iter: I) -> Expr {
        iter.fold(Expr::one(), |acc, e| acc.mul_ref(&e))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, (m, c)) in self.terms.iter().enumerate() {
            let magnitude = c.abs();
            if i == 0 {
                if c.is_negative() {
                    write!(f, "-")?;
                }
            } else if c.is_negative() {
                write!(f, " - ")?;
            } else {
                write!(f, " + ")?;
            }
            if m.is_one() {
                write!(f, "{magnitude}")?;
            } else if magnitude.is_one() {
                write!(f, "{m}")?;
            } else {
                write!(f, "{magnitude}*{m}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::symbol("x")
    }

    fn y() -> Expr {
        Expr::symbol("y")
    }

    // --- arithmetic ---

    #[test]
    fn test_zero_and_one() {
        assert!(Expr::zero().is_zero());
        assert!(Expr::one().is_one());
        assert_eq!(Expr::integer(0), Expr::zero());
        assert_eq!(Expr::ratio(2, 2), Expr::one());
    }

    #[test]
    fn test_like_terms_combine() {
        let e = &x() + &x();
        assert_eq!(e, &Expr::integer(2) * &x());
        assert!((&x() - &x()).is_zero());
    }

    #[test]
    fn test_expansion() {
        let square = (&x() + &y()).powu(2);
        let expected = &(&x() * &x()) + &(&(&Expr::integer(2) * &x()) * &y()) + &y() * &y();
        assert_eq!(square, expected);
    }

    #[test]
    fn test_single_term_inverse() {
        let e = &Expr::integer(3) * &(&x() * &y());
        let inv = e.recip().unwrap();
        assert!((&e * &inv).is_one());
    }

    #[test]
    fn test_group_inverse_cancels_after_clearing() {
        let sum = &x() + &y();
        let inv = sum.recip().unwrap();
        let product = &sum * &inv;
        // The group denominator is not cancelled structurally ...
        assert!(!product.is_one());
        // ... but the difference to 1 reduces to zero.
        assert!(product.equivalent(&Expr::one()));
    }

    #[test]
    fn test_group_normalizes_leading_coefficient() {
        let a = (&Expr::integer(2) * &(&x() + &y())).recip().unwrap();
        let b = (&x() + &y()).recip().unwrap();
        assert_eq!(a, b.scale(&BigRational::new(1.into(), 2.into())));
    }

    #[test]
    fn test_group_positive_power_expands() {
        let sum = &x() + &y();
        let inv = sum.powi(-1).unwrap();
        let back = inv.powi(-1).unwrap();
        assert_eq!(back, sum);
    }

    #[test]
    fn test_negative_power_of_zero_fails() {
        assert!(matches!(
            Expr::zero().powi(-2),
            Err(Error::SingularExpression(_))
        ));
    }

    #[test]
    fn test_nested_groups_are_cleared() {
        let sum = &x() + &y();
        // 1 / (1 + 1/(x + y)) == (x + y) / (x + y + 1)
        let nested = (&Expr::one() + &sum.recip().unwrap()).recip().unwrap();
        let flat = &sum * &(&sum + &Expr::one()).recip().unwrap();
        assert!(nested.equivalent(&flat));
        assert!((&nested - &flat).clear_denominators().is_zero());
        assert!(!nested.equivalent(&Expr::one()));
    }

    // --- function nodes ---

    #[test]
    fn test_log_exp_cancel() {
        let e = x().ln().unwrap().exp();
        assert_eq!(e, x());
        let e = x().exp().ln().unwrap();
        assert_eq!(e, x());
    }

    #[test]
    fn test_log_of_one_and_exp_of_zero() {
        assert!(Expr::one().ln().unwrap().is_zero());
        assert!(Expr::zero().exp().is_one());
        assert!(Expr::zero().ln().is_err());
    }

    #[test]
    fn test_log_is_opaque() {
        let l = (&x() + &y()).ln().unwrap();
        assert_eq!(l.num_terms(), 1);
        assert_eq!(l.to_string(), "log(x + y)");
    }

    // --- substitution ---

    #[test]
    fn test_substitute_symbol() {
        let e = &x() * &y();
        let mut map = HashMap::new();
        map.insert(Symbol::new("x"), &y() + &Expr::one());
        let out = e.substitute(&map).unwrap();
        assert_eq!(out, &(&y() * &y()) + &y());
    }

    #[test]
    fn test_substitute_inside_log_resimplifies() {
        let e = Expr::symbol("c").exp();
        let mut map = HashMap::new();
        map.insert(Symbol::new("c"), x().ln().unwrap());
        assert_eq!(e.substitute(&map).unwrap(), x());
    }

    #[test]
    fn test_substitute_negative_power_groups() {
        let e = x().recip().unwrap();
        let mut map = HashMap::new();
        map.insert(Symbol::new("x"), &y() + &Expr::one());
        let out = e.substitute(&map).unwrap();
        assert_eq!(out, (&y() + &Expr::one()).recip().unwrap());
    }

    #[test]
    fn test_substitute_to_zero_denominator_fails() {
        let e = x().recip().unwrap();
        let mut map = HashMap::new();
        map.insert(Symbol::new("x"), Expr::zero());
        assert!(e.substitute(&map).is_err());
    }

    #[test]
    fn test_free_symbols_recurse() {
        let e = &(&x() + &Expr::symbol("z")).ln().unwrap() * &y();
        let names: Vec<String> = e.free_symbols().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
    }

    // --- display ---

    #[test]
    fn test_display() {
        let e = &(&Expr::ratio(1, 2) * &x()) - &y();
        assert_eq!(e.to_string(), "1/2*x - y");
        assert_eq!(Expr::zero().to_string(), "0");
        assert_eq!(Expr::integer(-3).to_string(), "-3");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy for small polynomials over three symbols.
    fn small_expr() -> impl Strategy<Value = Expr> {
        proptest::collection::vec((-5_i64..=5, 0_u32..=2, 0_u32..=2, 0_u32..=2), 1..=4).prop_map(
            |terms| {
                terms
                    .into_iter()
                    .map(|(c, a, b, d)| {
                        &(&Expr::integer(c) * &Expr::symbol("a").powu(a))
                            * &(&Expr::symbol("b").powu(b) * &Expr::symbol("d").powu(d))
                    })
                    .sum::<Expr>()
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn addition_commutes(p in small_expr(), q in small_expr()) {
            prop_assert_eq!(&p + &q, &q + &p);
        }

        #[test]
        fn multiplication_commutes(p in small_expr(), q in small_expr()) {
            prop_assert_eq!(&p * &q, &q * &p);
        }

        #[test]
        fn multiplication_distributes(p in small_expr(), q in small_expr(), r in small_expr()) {
            prop_assert_eq!(&p * &(&q + &r), &(&p * &q) + &(&p * &r));
        }

        #[test]
        fn self_difference_is_zero(p in small_expr()) {
            prop_assert!((&p - &p).is_zero());
        }

        #[test]
        fn inverse_is_equivalent_to_division(p in small_expr()) {
            prop_assume!(!p.is_zero());
            let inv = p.recip().unwrap();
            prop_assert!((&p * &inv).equivalent(&Expr::one()));
        }

        #[test]
        fn powers_add(p in small_expr(), a in 0_u32..3, b in 0_u32..3) {
            prop_assert_eq!(&p.powu(a) * &p.powu(b), p.powu(a + b));
        }
    }
}
