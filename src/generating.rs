//! Moment, central-moment, and cumulant generating functions.
//!
//! # Definitions
//!
//! For a stencil with velocities `c_i` and distribution values `f_i`, the
//! moment generating function is
//!
//! ```text
//! F(x) = sum_i f_i * prod_k X_k^{c_ik},   X_k = exp(x_k)
//!      = sum_i f_i * exp(c_i . x)
//! ```
//!
//! whose Taylor coefficient at `x^a`, times `a!`, is the raw moment
//! `sum_i f_i * c_i^a`. The cumulant generating function is `log F`, and
//! the central-moment generating function replaces `c_i` by `c_i - u` for a
//! mean velocity `u`.
//!
//! Generating functions are plain values: building one performs no
//! expansion, and equal inputs give equal (`==`) functions. Expansion is the
//! job of [`crate::series`].

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::index::MomentIndex;
use crate::stencil::{DistributionSymbols, Stencil};
use crate::symbolic::Expr;

/// A formal generating function in `dim` auxiliary variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GeneratingFunction {
    /// `sum_i weight_i * exp(exponent_i . x)`.
    Discrete {
        /// Number of auxiliary variables.
        dim: usize,
        /// `(weight, exponent vector)` per stencil velocity.
        terms: Vec<(Expr, Vec<Expr>)>,
    },
    /// `sum_a s_a * x^a / a!` with the given coefficients; absent
    /// coefficients are zero.
    Formal {
        /// Number of auxiliary variables.
        dim: usize,
        /// Coefficient `s_a` per index `a`.
        coefficients: BTreeMap<MomentIndex, Expr>,
    },
    /// Tagged natural logarithm of the inner function.
    Log(Box<GeneratingFunction>),
    /// Tagged exponential of the inner function.
    Exp(Box<GeneratingFunction>),
}

impl GeneratingFunction {
    /// Number of auxiliary variables.
    pub fn dim(&self) -> usize {
        match self {
            GeneratingFunction::Discrete { dim, .. } | GeneratingFunction::Formal { dim, .. } => {
                *dim
            }
            GeneratingFunction::Log(inner) | GeneratingFunction::Exp(inner) => inner.dim(),
        }
    }

    /// Wraps in a logarithm node.
    pub fn ln(self) -> Self {
        GeneratingFunction::Log(Box::new(self))
    }

    /// Wraps in an exponential node.
    pub fn exp(self) -> Self {
        GeneratingFunction::Exp(Box::new(self))
    }

    /// Closed-form value at `x = 0`.
    ///
    /// For a discrete function this is the total mass `sum_i weight_i`;
    /// a logarithm node gives `log` of the inner value.
    ///
    /// # Errors
    /// Returns [`Error::SingularExpression`] for the logarithm of a zero
    /// total mass.
    pub fn value_at_origin(&self) -> Result<Expr> {
        match self {
            GeneratingFunction::Discrete { terms, .. } => {
                Ok(terms.iter().map(|(w, _)| w).sum())
            }
            GeneratingFunction::Formal { dim, coefficients } => Ok(coefficients
                .get(&MomentIndex::zero(*dim))
                .cloned()
                .unwrap_or_default()),
            GeneratingFunction::Log(inner) => inner.value_at_origin()?.ln(),
            GeneratingFunction::Exp(inner) => Ok(inner.value_at_origin()?.exp()),
        }
    }
}

/// Builds `F(x) = sum_i f_i * exp(c_i . x)`.
///
/// # Errors
/// Returns [`Error::SymbolCountMismatch`] if `symbols` does not have one
/// entry per velocity.
pub fn moment_generating_function(
    stencil: &Stencil,
    symbols: &DistributionSymbols,
) -> Result<GeneratingFunction> {
    symbols.check_matches(stencil)?;
    let terms = stencil
        .velocities()
        .iter()
        .zip(symbols.as_slice())
        .map(|(c, f)| {
            let exponents = c.iter().map(|&ck| Expr::integer(i64::from(ck))).collect();
            (f.clone(), exponents)
        })
        .collect();
    Ok(GeneratingFunction::Discrete {
        dim: stencil.dim(),
        terms,
    })
}

/// Builds `log F(x)`.
///
/// # Errors
/// As for [`moment_generating_function`].
pub fn cumulant_generating_function(
    stencil: &Stencil,
    symbols: &DistributionSymbols,
) -> Result<GeneratingFunction> {
    Ok(moment_generating_function(stencil, symbols)?.ln())
}

/// The mean velocity `u_k = m_{e_k} / m_0`: first raw moments divided by
/// the total mass.
///
/// # Errors
/// - [`Error::SymbolCountMismatch`] if the symbol count is wrong.
/// - [`Error::SingularExpression`] if the total mass is literally zero.
pub fn mean_velocity(stencil: &Stencil, symbols: &DistributionSymbols) -> Result<Vec<Expr>> {
    symbols.check_matches(stencil)?;
    let inverse_mass = symbols.total().recip()?;
    Ok((0..stencil.dim())
        .map(|k| {
            let first_moment: Expr = stencil
                .velocities()
                .iter()
                .zip(symbols.as_slice())
                .map(|(c, f)| f * &Expr::integer(i64::from(c[k])))
                .sum();
            &first_moment * &inverse_mass
        })
        .collect())
}

/// Builds `sum_i f_i * exp((c_i - u) . x)`.
///
/// When `mean` is `None` the mean velocity is computed with
/// [`mean_velocity`], which makes every order-1 central moment vanish.
///
/// # Errors
/// - [`Error::SymbolCountMismatch`] if the symbol count is wrong.
/// - [`Error::DimensionMismatch`] if `mean` has the wrong length.
/// - [`Error::SingularExpression`] as for [`mean_velocity`].
pub fn central_moment_generating_function(
    stencil: &Stencil,
    symbols: &DistributionSymbols,
    mean: Option<&[Expr]>,
) -> Result<GeneratingFunction> {
    symbols.check_matches(stencil)?;
    let mean = match mean {
        Some(u) if u.len() != stencil.dim() => {
            return Err(Error::DimensionMismatch {
                expected: stencil.dim(),
                found: u.len(),
            });
        }
        Some(u) => u.to_vec(),
        None => mean_velocity(stencil, symbols)?,
    };
    let terms = stencil
        .velocities()
        .iter()
        .zip(symbols.as_slice())
        .map(|(c, f)| {
            let exponents = c
                .iter()
                .zip(&mean)
                .map(|(&ck, uk)| &Expr::integer(i64::from(ck)) - uk)
                .collect();
            (f.clone(), exponents)
        })
        .collect();
    Ok(GeneratingFunction::Discrete {
        dim: stencil.dim(),
        terms,
    })
}

/// Builds the logarithm of the central-moment generating function.
///
/// Its coefficients equal the ordinary cumulants except at order 1, where
/// they vanish.
///
/// # Errors
/// As for [`central_moment_generating_function`].
pub fn central_cumulant_generating_function(
    stencil: &Stencil,
    symbols: &DistributionSymbols,
    mean: Option<&[Expr]>,
) -> Result<GeneratingFunction> {
    Ok(central_moment_generating_function(stencil, symbols, mean)?.ln())
}

/// Builds `sum_a s_a * x^a / a!` from the given coefficients.
///
/// # Errors
/// Returns [`Error::DimensionMismatch`] if a coefficient index does not have
/// `dim` components.
pub fn formal_series(
    dim: usize,
    coefficients: impl IntoIterator<Item = (MomentIndex, Expr)>,
) -> Result<GeneratingFunction> {
    let mut map = BTreeMap::new();
    for (index, value) in coefficients {
        if index.dim() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                found: index.dim(),
            });
        }
        if !value.is_zero() {
            map.insert(index, value);
        }
    }
    Ok(GeneratingFunction::Formal {
        dim,
        coefficients: map,
    })
}
