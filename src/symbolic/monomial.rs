//! Atoms and monomials: the multiplicative building blocks of [`Expr`].

use std::fmt;
use std::sync::Arc;

use super::Expr;

/// A named formal parameter such as `f_3` or `m_2_0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Creates a symbol with the given name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the symbol name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An indivisible factor of a monomial.
///
/// `Log` and `Exp` are tagged, unevaluated function nodes. `Group` holds a
/// multi-term sum that only ever appears with a negative exponent, e.g. the
/// `(f_0 + f_1 + ...)^-2` produced when dividing by the total mass. Its
/// payload is normalized so the first term has coefficient 1.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Atom {
    /// A formal parameter.
    Symbol(Symbol),
    /// Natural logarithm of the payload.
    Log(Expr),
    /// Exponential of the payload.
    Exp(Expr),
    /// A multi-term sum kept intact as a denominator.
    Group(Expr),
}

impl Atom {
    pub(crate) fn is_group(&self) -> bool {
        matches!(self, Atom::Group(_))
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Symbol(s) => write!(f, "{s}"),
            Atom::Log(e) => write!(f, "log({e})"),
            Atom::Exp(e) => write!(f, "exp({e})"),
            Atom::Group(e) => write!(f, "({e})"),
        }
    }
}

/// A product of atoms raised to nonzero integer powers.
///
/// Represented as a list of `(atom, exponent)` pairs sorted by atom, with
/// no repeated atoms and no zero exponents. The empty list is the constant
/// monomial `1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Monomial {
    powers: Vec<(Atom, i32)>,
}

impl Monomial {
    /// The constant monomial `1`.
    pub fn one() -> Self {
        Self { powers: Vec::new() }
    }

    /// A single atom to the first power.
    pub fn atom(atom: Atom) -> Self {
        Self {
            powers: vec![(atom, 1)],
        }
    }

    /// Creates a monomial from arbitrary `(atom, exponent)` pairs, merging
    /// repeated atoms and dropping zero exponents.
    pub fn new(mut powers: Vec<(Atom, i32)>) -> Self {
        powers.sort_by(|a, b| a.0.cmp(&b.0));

        let mut merged: Vec<(Atom, i32)> = Vec::with_capacity(powers.len());
        for (atom, p) in powers {
            if let Some((last, last_p)) = merged.last_mut() {
                if *last == atom {
                    *last_p += p;
                    continue;
                }
            }
            merged.push((atom, p));
        }
        merged.retain(|&(_, p)| p != 0);

        Self { powers: merged }
    }

    /// Is this the constant monomial?
    pub fn is_one(&self) -> bool {
        self.powers.is_empty()
    }

    /// The `(atom, exponent)` pairs in canonical order.
    pub fn powers(&self) -> &[(Atom, i32)] {
        &self.powers
    }

    /// Sum of exponents over symbol atoms.
    pub fn degree(&self) -> i32 {
        self.powers
            .iter()
            .filter(|(a, _)| matches!(a, Atom::Symbol(_)))
            .map(|&(_, p)| p)
            .sum()
    }

    /// Multiplies two monomials with a sorted merge.
    pub fn mul(&self, other: &Monomial) -> Monomial {
        let mut powers = Vec::with_capacity(self.powers.len() + other.powers.len());
        let (mut i, mut j) = (0, 0);
        while i < self.powers.len() && j < other.powers.len() {
            let (a, p) = &self.powers[i];
            let (b, q) = &other.powers[j];
            match a.cmp(b) {
                std::cmp::Ordering::Less => {
                    powers.push((a.clone(), *p));
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    powers.push((b.clone(), *q));
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    if p + q != 0 {
                        powers.push((a.clone(), p + q));
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        powers.extend_from_slice(&self.powers[i..]);
        powers.extend_from_slice(&other.powers[j..]);
        Monomial { powers }
    }

    /// Raises every exponent to the `k`-th power.
    pub fn powi(&self, k: i32) -> Monomial {
        if k == 0 {
            return Monomial::one();
        }
        Monomial {
            powers: self
                .powers
                .iter()
                .map(|(a, p)| (a.clone(), p * k))
                .collect(),
        }
    }

    /// Splits off the first group atom carrying a positive exponent.
    pub(crate) fn take_positive_group(&self) -> Option<(Expr, i32, Monomial)> {
        let pos = self
            .powers
            .iter()
            .position(|(a, p)| a.is_group() && *p > 0)?;
        let (atom, p) = &self.powers[pos];
        let Atom::Group(inner) = atom else {
            return None;
        };
        let mut rest = self.powers.clone();
        rest.remove(pos);
        Some((inner.clone(), *p, Monomial { powers: rest }))
    }
}

impl fmt::Display for Monomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.powers.is_empty() {
            return write!(f, "1");
        }
        let parts: Vec<String> = self
            .powers
            .iter()
            .map(|(a, p)| {
                if *p == 1 {
                    format!("{a}")
                } else {
                    format!("{a}^{p}")
                }
            })
            .collect();
        write!(f, "{}", parts.join("*"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Atom {
        Atom::Symbol(Symbol::new(name))
    }

    #[test]
    fn test_new_merges_and_sorts() {
        let m = Monomial::new(vec![(sym("y"), 1), (sym("x"), 2), (sym("y"), 2)]);
        assert_eq!(m.powers(), &[(sym("x"), 2), (sym("y"), 3)]);
    }

    #[test]
    fn test_new_drops_cancelled_atoms() {
        let m = Monomial::new(vec![(sym("x"), 2), (sym("x"), -2)]);
        assert!(m.is_one());
    }

    #[test]
    fn test_mul_adds_exponents() {
        let a = Monomial::new(vec![(sym("x"), 1), (sym("z"), -1)]);
        let b = Monomial::new(vec![(sym("y"), 3), (sym("z"), 1)]);
        let prod = a.mul(&b);
        assert_eq!(prod, Monomial::new(vec![(sym("x"), 1), (sym("y"), 3)]));
    }

    #[test]
    fn test_powi() {
        let m = Monomial::new(vec![(sym("x"), 2), (sym("y"), -1)]);
        assert_eq!(m.powi(-2), Monomial::new(vec![(sym("x"), -4), (sym("y"), 2)]));
        assert!(m.powi(0).is_one());
    }

    #[test]
    fn test_degree_counts_symbols() {
        let m = Monomial::new(vec![(sym("x"), 2), (sym("y"), -1)]);
        assert_eq!(m.degree(), 1);
    }

    #[test]
    fn test_display() {
        let m = Monomial::new(vec![(sym("x"), 2), (sym("y"), 1)]);
        assert_eq!(m.to_string(), "x^2*y");
        assert_eq!(Monomial::one().to_string(), "1");
    }
}
