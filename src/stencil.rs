//! Velocity stencils and per-velocity distribution symbols.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::symbolic::Expr;

/// Ordered set of distinct integer velocity vectors sharing one dimension.
///
/// # Examples
/// ```
/// use u_cumulants::Stencil;
/// let d2q9 = Stencil::full(2).unwrap();
/// assert_eq!(d2q9.len(), 9);
/// assert_eq!(d2q9.dim(), 2);
/// assert_eq!(d2q9.velocities()[0], vec![0, 0]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Stencil {
    dim: usize,
    velocities: Arc<[Vec<i32>]>,
}

impl Stencil {
    /// Creates a stencil from its velocities, in order.
    ///
    /// # Errors
    /// Returns [`Error::InvalidStencil`] if there are no velocities, the
    /// velocities are zero-dimensional or differ in dimension, or a velocity
    /// repeats.
    pub fn new<I, V>(velocities: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<i32>>,
    {
        let velocities: Vec<Vec<i32>> = velocities.into_iter().map(Into::into).collect();
        let Some(first) = velocities.first() else {
            return Err(Error::InvalidStencil("no velocities".to_string()));
        };
        let dim = first.len();
        if dim == 0 {
            return Err(Error::InvalidStencil(
                "velocities must have at least one component".to_string(),
            ));
        }
        {
            let mut seen = HashSet::with_capacity(velocities.len());
            for (i, v) in velocities.iter().enumerate() {
                if v.len() != dim {
                    return Err(Error::InvalidStencil(format!(
                        "velocity {i} has {} components, expected {dim}",
                        v.len()
                    )));
                }
                if !seen.insert(v.as_slice()) {
                    return Err(Error::InvalidStencil(format!(
                        "velocity {v:?} appears more than once"
                    )));
                }
            }
        }
        Ok(Self {
            dim,
            velocities: velocities.into(),
        })
    }

    /// The full `{-1, 0, 1}^dim` lattice (D1Q3, D2Q9, D3Q27, ...).
    ///
    /// The rest velocity comes first, followed by the others in order of
    /// increasing speed, ties broken lexicographically.
    ///
    /// # Errors
    /// Returns [`Error::InvalidStencil`] if `dim == 0`.
    pub fn full(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidStencil(
                "velocities must have at least one component".to_string(),
            ));
        }
        let mut velocities: Vec<Vec<i32>> = vec![Vec::new()];
        for _ in 0..dim {
            velocities = velocities
                .into_iter()
                .flat_map(|v| {
                    [-1, 0, 1].into_iter().map(move |c| {
                        let mut next = v.clone();
                        next.push(c);
                        next
                    })
                })
                .collect();
        }
        velocities.sort_by_key(|v| (v.iter().map(|c| c.abs()).sum::<i32>(), v.clone()));
        Self::new(velocities)
    }

    /// Number of components per velocity.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of velocities `Q`.
    pub fn len(&self) -> usize {
        self.velocities.len()
    }

    /// Always `false`: construction rejects empty stencils.
    pub fn is_empty(&self) -> bool {
        self.velocities.is_empty()
    }

    /// The velocities in stencil order.
    pub fn velocities(&self) -> &[Vec<i32>] {
        &self.velocities
    }
}

/// One symbolic scalar per stencil velocity, in stencil order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DistributionSymbols {
    symbols: Arc<[Expr]>,
}

impl DistributionSymbols {
    /// Wraps arbitrary expressions as distribution values.
    pub fn new(symbols: impl IntoIterator<Item = Expr>) -> Self {
        Self {
            symbols: symbols.into_iter().collect(),
        }
    }

    /// Symbols `{prefix}_0 .. {prefix}_{count-1}`.
    ///
    /// # Examples
    /// ```
    /// use u_cumulants::DistributionSymbols;
    /// let f = DistributionSymbols::indexed("f", 3);
    /// assert_eq!(f.as_slice()[2].to_string(), "f_2");
    /// ```
    pub fn indexed(prefix: &str, count: usize) -> Self {
        Self::new((0..count).map(|i| Expr::symbol(format!("{prefix}_{i}"))))
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Is the sequence empty?
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The symbols in stencil order.
    pub fn as_slice(&self) -> &[Expr] {
        &self.symbols
    }

    /// Sum of all symbols: the zeroth raw moment.
    pub fn total(&self) -> Expr {
        self.symbols.iter().sum()
    }

    /// Checks that there is one symbol per velocity of `stencil`.
    ///
    /// # Errors
    /// Returns [`Error::SymbolCountMismatch`] otherwise.
    pub fn check_matches(&self, stencil: &Stencil) -> Result<()> {
        if self.len() != stencil.len() {
            return Err(Error::SymbolCountMismatch {
                expected: stencil.len(),
                found: self.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_stencil_sizes() {
        assert_eq!(Stencil::full(1).unwrap().len(), 3);
        assert_eq!(Stencil::full(2).unwrap().len(), 9);
        assert_eq!(Stencil::full(3).unwrap().len(), 27);
    }

    #[test]
    fn test_full_stencil_ordering() {
        let s = Stencil::full(2).unwrap();
        assert_eq!(s.velocities()[0], vec![0, 0]);
        assert_eq!(s.velocities()[1], vec![-1, 0]);
        assert_eq!(s.velocities()[8], vec![1, 1]);
    }

    #[test]
    fn test_full_zero_dim_rejected() {
        assert!(matches!(Stencil::full(0), Err(Error::InvalidStencil(_))));
    }

    #[test]
    fn test_empty_stencil_rejected() {
        let empty: Vec<Vec<i32>> = Vec::new();
        assert!(matches!(Stencil::new(empty), Err(Error::InvalidStencil(_))));
    }

    #[test]
    fn test_duplicate_velocity_rejected() {
        let result = Stencil::new([vec![0, 0], vec![1, 0], vec![0, 0]]);
        assert!(matches!(result, Err(Error::InvalidStencil(_))));
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        let result = Stencil::new([vec![0, 0], vec![1, 0, 0]]);
        assert!(matches!(result, Err(Error::InvalidStencil(_))));
    }

    #[test]
    fn test_indexed_symbols() {
        let f = DistributionSymbols::indexed("f", 9);
        assert_eq!(f.len(), 9);
        assert_eq!(f.as_slice()[0], Expr::symbol("f_0"));
        assert_eq!(f.total().num_terms(), 9);
    }

    #[test]
    fn test_symbol_count_check() {
        let s = Stencil::full(2).unwrap();
        let f = DistributionSymbols::indexed("f", 8);
        assert!(matches!(
            f.check_matches(&s),
            Err(Error::SymbolCountMismatch { expected: 9, found: 8 })
        ));
    }
}
