//! Error types for u-cumulants.

use thiserror::Error;

use crate::index::{Index, MomentIndex};
use crate::symbolic::Expr;

/// Result type alias for u-cumulants operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by index construction, generating functions, and the
/// transformation engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// An index, mean velocity, or supplied map key has the wrong number of
    /// components for the stencil or relation it is used with.
    #[error("dimension mismatch: expected {expected} components, got {found}")]
    DimensionMismatch {
        /// Dimension required by the stencil or the requested index.
        expected: usize,
        /// Dimension of the offending value.
        found: usize,
    },

    /// A strict-mode relation needs an entry the supplied map lacks.
    #[error("incomplete substitution for {index}: no entry for {missing}")]
    IncompleteSubstitution {
        /// Index whose relation was requested.
        index: MomentIndex,
        /// First lower-or-equal order index without a supplied value.
        missing: MomentIndex,
    },

    /// An index that cannot describe any moment.
    #[error("degenerate index: {0}")]
    DegenerateIndex(String),

    /// Velocities violate the stencil constraints.
    #[error("invalid stencil: {0}")]
    InvalidStencil(String),

    /// The number of distribution symbols differs from the velocity count.
    #[error("expected {expected} distribution symbols, got {found}")]
    SymbolCountMismatch {
        /// Velocity count of the stencil.
        expected: usize,
        /// Number of symbols supplied.
        found: usize,
    },

    /// Negative power or logarithm of an expression that is literally zero.
    #[error("singular expression: {0}")]
    SingularExpression(String),

    /// An identity check left a difference that does not reduce to zero.
    #[error("identity check failed for {index}: residual {residual}")]
    NonZeroResidual {
        /// Index whose two derivations disagree.
        index: Index,
        /// The difference between the two derivations.
        residual: Expr,
    },

    /// Engine configuration rejected by [`EngineConfig::validate`](crate::EngineConfig::validate).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
