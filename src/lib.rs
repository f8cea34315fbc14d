//! # u-cumulants
//!
//! Exact symbolic moment and cumulant transformations for discrete velocity
//! stencils.
//!
//! Given a stencil of integer velocities and one symbol per velocity, this
//! crate derives closed-form expressions for raw moments, central moments,
//! and cumulants of the distribution, and the relations converting between
//! moments and cumulants in both directions. Everything stays exact: results
//! are rational-coefficient expressions, never floating-point numbers.
//!
//! ## Modules
//!
//! - [`symbolic`]: exact expressions with `log`/`exp` nodes and substitution
//! - [`index`]: moment indices, polynomial combinations, enumeration
//! - [`stencil`]: velocity sets and distribution symbols
//! - [`generating`]: moment, central-moment, and cumulant generating functions
//! - [`series`]: truncated Taylor expansion and coefficient extraction
//! - [`engine`]: the cached transformation engine
//!
//! ## Example
//!
//! ```
//! use u_cumulants::{moments_up_to_component_order, CumulantEngine, Stencil};
//!
//! let engine = CumulantEngine::new();
//! let d2q9 = Stencil::full(2).unwrap();
//! let f = engine.default_symbols(&d2q9);
//! let indices = moments_up_to_component_order(2, 2);
//!
//! let cumulants = engine.cumulants_from_distribution(&d2q9, &f, indices.iter()).unwrap();
//! assert_eq!(cumulants.len(), 9);
//! engine.verify_commuting_diagram(&d2q9, &f, indices).unwrap();
//! ```
//!
//! ## Design Philosophy
//!
//! - **Exactness first**: `num-rational` coefficients, cancellation to a
//!   literal `0`
//! - **Derive, don't invert**: every relation comes from its own
//!   generating-function identity
//! - **Property-based testing**: algebraic invariants verified via proptest

mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod generating;
pub mod index;
pub mod result;
pub mod series;
pub mod stencil;
pub mod symbolic;

pub use config::{EngineConfig, SubstitutionPolicy};
pub use engine::{CumulantEngine, Relation};
pub use error::{Error, Result};
pub use generating::{
    central_cumulant_generating_function, central_moment_generating_function,
    cumulant_generating_function, formal_series, mean_velocity, moment_generating_function,
    GeneratingFunction,
};
pub use index::{
    enumerate_indices, moments_up_to_component_order, Index, MomentIndex,
    PolynomialMomentIndex,
};
pub use result::TransformationResult;
pub use series::{extract_coefficient, extract_index, extract_many, series_of, TruncatedSeries};
pub use stencil::{DistributionSymbols, Stencil};
pub use symbolic::{Expr, Symbol};
