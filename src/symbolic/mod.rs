//! Exact symbolic algebra.
//!
//! Expressions are sums of rational-coefficient monomials over atoms:
//! symbols, tagged `log`/`exp` nodes, and grouped sums used as
//! denominators. Coefficients are `num-rational` [`BigRational`]s, so
//! cancellation is exact and a vanishing difference reduces to the literal
//! constant `0`.
//!
//! [`BigRational`]: num_rational::BigRational

mod expr;
mod monomial;

pub use expr::Expr;
pub use monomial::{Atom, Monomial, Symbol};
