//! The transformation engine: distribution -> moments/cumulants and the
//! moment <-> cumulant relations.
//!
//! # Derivations
//!
//! | operation | generating function |
//! |---|---|
//! | raw moments | `F(x) = sum_i f_i exp(c_i . x)` |
//! | central moments | `sum_i f_i exp((c_i - u) . x)` |
//! | cumulants | `log F(x)` |
//! | cumulant from raw moments | `log(sum_b m_b x^b / b!)` |
//! | raw moment from cumulants | `exp(sum_b c_b x^b / b!)` |
//! | cumulant from central moments | as above, order-1 `m_b = 0` |
//! | central moment from cumulants | as above, order-1 `c_b = 0` |
//!
//! Each relation comes from its own identity and is never obtained by
//! inverting the opposite direction.
//!
//! Relations are derived once per monomial index as templates over default
//! symbols (`m_2_0`, `c_1_1`, ...) and then specialized by substituting the
//! caller's values.
//!
//! # Caching
//!
//! Every derived monomial expression is memoized under
//! `(stencil signature, index, transform kind)`. Polynomial indices are
//! assembled from their monomial terms, so they share cache entries with
//! the monomials they combine.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, trace};

use crate::cache::{CacheKey, StencilSignature, TransformCache, TransformKind};
use crate::config::{EngineConfig, SubstitutionPolicy};
use crate::error::{Error, Result};
use crate::generating::{
    central_moment_generating_function, cumulant_generating_function, formal_series,
    moment_generating_function, GeneratingFunction,
};
use crate::index::{moments_up_to_component_order, Index, MomentIndex};
use crate::result::TransformationResult;
use crate::series::{extract_many, join_bound};
use crate::stencil::{DistributionSymbols, Stencil};
use crate::symbolic::{Expr, Symbol};

/// A moment <-> cumulant relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Cumulant in terms of raw moments.
    CumulantFromRawMoments,
    /// Raw moment in terms of cumulants.
    RawMomentFromCumulants,
    /// Cumulant in terms of central moments.
    CumulantFromCentralMoments,
    /// Central moment in terms of cumulants.
    CentralMomentFromCumulants,
}

impl Relation {
    /// All four relations.
    pub const ALL: [Relation; 4] = [
        Relation::CumulantFromRawMoments,
        Relation::RawMomentFromCumulants,
        Relation::CumulantFromCentralMoments,
        Relation::CentralMomentFromCumulants,
    ];

    fn kind(self) -> TransformKind {
        match self {
            Relation::CumulantFromRawMoments => TransformKind::CumulantFromRawMoments,
            Relation::RawMomentFromCumulants => TransformKind::RawMomentFromCumulants,
            Relation::CumulantFromCentralMoments => TransformKind::CumulantFromCentralMoments,
            Relation::CentralMomentFromCumulants => TransformKind::CentralMomentFromCumulants,
        }
    }

    /// Order-1 inputs are zero and never substituted.
    fn is_central(self) -> bool {
        matches!(
            self,
            Relation::CumulantFromCentralMoments | Relation::CentralMomentFromCumulants
        )
    }

    /// Cumulants are the logarithm side of every identity.
    fn yields_cumulant(self) -> bool {
        matches!(
            self,
            Relation::CumulantFromRawMoments | Relation::CumulantFromCentralMoments
        )
    }

    /// Prefix of the symbols the relation is written in.
    fn input_prefix(self, config: &EngineConfig) -> &str {
        match self {
            Relation::CumulantFromRawMoments => &config.raw_moment_prefix,
            Relation::CumulantFromCentralMoments => &config.central_moment_prefix,
            Relation::RawMomentFromCumulants | Relation::CentralMomentFromCumulants => {
                &config.cumulant_prefix
            }
        }
    }
}

/// Symbolic transformation engine with an owned memo table.
///
/// All operations take `&self`; the engine is `Send + Sync` and may be
/// shared across threads.
///
/// # Examples
/// ```
/// use u_cumulants::{CumulantEngine, Expr, MomentIndex, Stencil, TransformationResult};
///
/// let engine = CumulantEngine::new();
/// let d2q9 = Stencil::full(2).unwrap();
/// let f = engine.default_symbols(&d2q9);
///
/// let c00 = engine
///     .cumulants_from_distribution(&d2q9, &f, [MomentIndex::from((0, 0))])
///     .unwrap();
/// assert_eq!(c00.get((0, 0)), Some(&f.total().ln().unwrap()));
///
/// let c10 = engine
///     .cumulant_as_function_of_raw_moments((1, 0), &TransformationResult::new())
///     .unwrap();
/// assert_eq!(c10.to_string(), "m_0_0^-1*m_1_0");
/// ```
#[derive(Debug, Default)]
pub struct CumulantEngine {
    config: EngineConfig,
    cache: TransformCache,
}

impl CumulantEngine {
    /// Creates an engine with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with a validated configuration.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if `config` fails validation.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cache: TransformCache::new(),
        })
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Drops every memoized expression.
    pub fn clear_cache(&self) {
        let dropped = self.cache.len();
        self.cache.clear();
        debug!(dropped, "cleared transform cache");
    }

    /// Number of memoized expressions.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Distribution symbols `f_0 .. f_{Q-1}` (with the configured prefix).
    pub fn default_symbols(&self, stencil: &Stencil) -> DistributionSymbols {
        DistributionSymbols::indexed(&self.config.distribution_prefix, stencil.len())
    }

    // ------------------------------------------------------------------
    // Distribution-based transforms
    // ------------------------------------------------------------------

    /// Raw moments `sum_i f_i * c_i^a` for each requested index.
    ///
    /// # Errors
    /// - [`Error::SymbolCountMismatch`] if `symbols` does not match `stencil`.
    /// - [`Error::DimensionMismatch`] if an index has the wrong dimension.
    pub fn raw_moments_from_distribution<I>(
        &self,
        stencil: &Stencil,
        symbols: &DistributionSymbols,
        indices: I,
    ) -> Result<TransformationResult>
    where
        I: IntoIterator,
        I::Item: Into<Index>,
    {
        self.from_distribution(
            TransformKind::RawMomentFromDistribution,
            stencil,
            symbols,
            None,
            indices.into_iter().map(Into::into).collect(),
            || moment_generating_function(stencil, symbols),
        )
    }

    /// Central moments `sum_i f_i * (c_i - u)^a` for each requested index.
    ///
    /// With `mean = None` the mean velocity is `m_1 / m_0`, and order-1
    /// entries are the closed form `0`.
    ///
    /// # Errors
    /// As for [`raw_moments_from_distribution`](Self::raw_moments_from_distribution),
    /// plus [`Error::DimensionMismatch`] for a mean of the wrong length and
    /// [`Error::SingularExpression`] for a literally zero total mass.
    pub fn central_moments_from_distribution<I>(
        &self,
        stencil: &Stencil,
        symbols: &DistributionSymbols,
        indices: I,
        mean: Option<&[Expr]>,
    ) -> Result<TransformationResult>
    where
        I: IntoIterator,
        I::Item: Into<Index>,
    {
        self.from_distribution(
            TransformKind::CentralMomentFromDistribution,
            stencil,
            symbols,
            mean,
            indices.into_iter().map(Into::into).collect(),
            || central_moment_generating_function(stencil, symbols, mean),
        )
    }

    /// Cumulants of the distribution for each requested index.
    ///
    /// Order-0 entries are `log(sum_i f_i)`.
    ///
    /// # Errors
    /// As for [`raw_moments_from_distribution`](Self::raw_moments_from_distribution),
    /// plus [`Error::SingularExpression`] for a literally zero total mass.
    pub fn cumulants_from_distribution<I>(
        &self,
        stencil: &Stencil,
        symbols: &DistributionSymbols,
        indices: I,
    ) -> Result<TransformationResult>
    where
        I: IntoIterator,
        I::Item: Into<Index>,
    {
        self.from_distribution(
            TransformKind::CumulantFromDistribution,
            stencil,
            symbols,
            None,
            indices.into_iter().map(Into::into).collect(),
            || cumulant_generating_function(stencil, symbols),
        )
    }

    /// Cumulants of every index with components `<= 2`, over the default
    /// distribution symbols.
    ///
    /// # Errors
    /// As for [`cumulants_from_distribution`](Self::cumulants_from_distribution).
    pub fn default_cumulants(&self, stencil: &Stencil) -> Result<TransformationResult> {
        let symbols = self.default_symbols(stencil);
        self.cumulants_from_distribution(
            stencil,
            &symbols,
            moments_up_to_component_order(2, stencil.dim()),
        )
    }

    fn from_distribution(
        &self,
        kind: TransformKind,
        stencil: &Stencil,
        symbols: &DistributionSymbols,
        mean: Option<&[Expr]>,
        indices: Vec<Index>,
        build: impl FnOnce() -> Result<GeneratingFunction>,
    ) -> Result<TransformationResult> {
        symbols.check_matches(stencil)?;
        if let Some(u) = mean {
            check_dim(stencil.dim(), u.len())?;
        }
        for index in &indices {
            check_dim(stencil.dim(), index.dim())?;
        }

        let signature = StencilSignature {
            stencil: stencil.clone(),
            symbols: symbols.clone(),
            mean: mean.map(<[Expr]>::to_vec),
        };
        let key_for = |index: &MomentIndex| CacheKey {
            signature: Some(signature.clone()),
            index: index.clone(),
            kind,
        };

        let mut values = HashMap::new();
        let mut misses = Vec::new();
        for m in unique_monomials(&indices) {
            if kind == TransformKind::CentralMomentFromDistribution
                && mean.is_none()
                && m.order() == 1
            {
                values.insert(m, Expr::zero());
                continue;
            }
            match self.lookup(&key_for(&m)) {
                Some(expr) => {
                    values.insert(m, expr);
                }
                None => misses.push(m),
            }
        }

        if !misses.is_empty() {
            debug!(?kind, count = misses.len(), "expanding generating function");
            let gf = build()?;
            let derived = extract_many(&gf, &misses)?;
            for (m, expr) in misses.into_iter().zip(derived) {
                let expr = self.store(key_for(&m), expr);
                values.insert(m, expr);
            }
        }
        Ok(assemble(indices, &values))
    }

    // ------------------------------------------------------------------
    // Moment <-> cumulant relations
    // ------------------------------------------------------------------

    /// Cumulant of `index` in terms of raw moments.
    ///
    /// `raw_moments` supplies values for the default symbols `m_b`; absent
    /// entries stay symbolic (or fail, under
    /// [`SubstitutionPolicy::Strict`]).
    ///
    /// # Errors
    /// See [`relations`](Self::relations).
    pub fn cumulant_as_function_of_raw_moments(
        &self,
        index: impl Into<Index>,
        raw_moments: &TransformationResult,
    ) -> Result<Expr> {
        self.relation(Relation::CumulantFromRawMoments, index, raw_moments)
    }

    /// Raw moment of `index` in terms of cumulants.
    ///
    /// # Errors
    /// See [`relations`](Self::relations).
    pub fn raw_moment_as_function_of_cumulants(
        &self,
        index: impl Into<Index>,
        cumulants: &TransformationResult,
    ) -> Result<Expr> {
        self.relation(Relation::RawMomentFromCumulants, index, cumulants)
    }

    /// Cumulant of `index` in terms of central moments.
    ///
    /// Order-1 central moments are zero, so order-1 cumulants come out as
    /// `0` here, unlike [`cumulant_as_function_of_raw_moments`](Self::cumulant_as_function_of_raw_moments).
    ///
    /// # Errors
    /// See [`relations`](Self::relations).
    pub fn cumulant_as_function_of_central_moments(
        &self,
        index: impl Into<Index>,
        central_moments: &TransformationResult,
    ) -> Result<Expr> {
        self.relation(Relation::CumulantFromCentralMoments, index, central_moments)
    }

    /// Central moment of `index` in terms of cumulants, with order-1
    /// cumulants taken as zero.
    ///
    /// # Errors
    /// See [`relations`](Self::relations).
    pub fn central_moment_as_function_of_cumulants(
        &self,
        index: impl Into<Index>,
        cumulants: &TransformationResult,
    ) -> Result<Expr> {
        self.relation(Relation::CentralMomentFromCumulants, index, cumulants)
    }

    /// Single-index form of [`relations`](Self::relations).
    ///
    /// # Errors
    /// See [`relations`](Self::relations).
    pub fn relation(
        &self,
        relation: Relation,
        index: impl Into<Index>,
        supplied: &TransformationResult,
    ) -> Result<Expr> {
        let index = index.into();
        let result = self.relations(relation, [index.clone()], supplied)?;
        Ok(result.get(index).cloned().unwrap_or_default())
    }

    /// Evaluates `relation` for every requested index.
    ///
    /// Monomial entries of `supplied` replace the matching default input
    /// symbols; polynomial entries are ignored.
    ///
    /// # Errors
    /// - [`Error::DimensionMismatch`] if the indices or the keys of
    ///   `supplied` disagree in dimension.
    /// - [`Error::IncompleteSubstitution`] in strict mode, for the first
    ///   lower-or-equal index without a supplied value.
    /// - [`Error::SingularExpression`] if a supplied zeroth moment is `0`.
    pub fn relations<I>(
        &self,
        relation: Relation,
        indices: I,
        supplied: &TransformationResult,
    ) -> Result<TransformationResult>
    where
        I: IntoIterator,
        I::Item: Into<Index>,
    {
        let indices: Vec<Index> = indices.into_iter().map(Into::into).collect();
        let Some(dim) = indices.first().map(Index::dim) else {
            return Ok(TransformationResult::new());
        };
        for index in &indices {
            check_dim(dim, index.dim())?;
        }
        for key in supplied.keys() {
            check_dim(dim, key.dim())?;
        }

        let monomials = unique_monomials(&indices);
        let templates = self.relation_templates(relation, &monomials)?;
        let mut values = HashMap::with_capacity(monomials.len());
        for (m, template) in monomials.into_iter().zip(templates) {
            let map = self.substitution_map(relation, &m, supplied)?;
            values.insert(m, template.substitute(&map)?);
        }
        Ok(assemble(indices, &values))
    }

    /// Relation expressions over default symbols, one per monomial.
    fn relation_templates(&self, relation: Relation, monomials: &[MomentIndex]) -> Result<Vec<Expr>> {
        let kind = relation.kind();
        let key_for = |index: &MomentIndex| CacheKey {
            signature: None,
            index: index.clone(),
            kind,
        };

        let mut found: Vec<Option<Expr>> =
            monomials.iter().map(|m| self.lookup(&key_for(m))).collect();
        let misses: Vec<MomentIndex> = monomials
            .iter()
            .zip(&found)
            .filter(|(_, hit)| hit.is_none())
            .map(|(m, _)| m.clone())
            .collect();

        if let Some(bound) = join_bound(misses.iter()) {
            debug!(?relation, count = misses.len(), "deriving relation templates");
            let prefix = relation.input_prefix(&self.config);
            let coefficients = bound
                .lower_box()
                .into_iter()
                .filter(|b| !(relation.is_central() && b.order() == 1))
                .map(|b| {
                    let symbol = Expr::symbol(b.symbol_name(prefix));
                    (b, symbol)
                });
            let series = formal_series(bound.dim(), coefficients)?;
            let gf = if relation.yields_cumulant() {
                series.ln()
            } else {
                series.exp()
            };
            let mut derived = misses
                .iter()
                .zip(extract_many(&gf, &misses)?)
                .map(|(m, expr)| self.store(key_for(m), expr));
            for slot in found.iter_mut().filter(|slot| slot.is_none()) {
                *slot = derived.next();
            }
        }
        Ok(found.into_iter().map(Option::unwrap_or_default).collect())
    }

    /// Maps default input symbols below `index` to supplied values.
    fn substitution_map(
        &self,
        relation: Relation,
        index: &MomentIndex,
        supplied: &TransformationResult,
    ) -> Result<HashMap<Symbol, Expr>> {
        let prefix = relation.input_prefix(&self.config);
        let mut map = HashMap::new();
        for b in index.lower_box() {
            if relation.is_central() && b.order() == 1 {
                continue;
            }
            match supplied.get(&b) {
                Some(value) => {
                    map.insert(Symbol::new(b.symbol_name(prefix)), value.clone());
                }
                None if self.config.substitution == SubstitutionPolicy::Strict => {
                    return Err(Error::IncompleteSubstitution {
                        index: index.clone(),
                        missing: b,
                    });
                }
                None => {}
            }
        }
        Ok(map)
    }

    // ------------------------------------------------------------------
    // Consistency check
    // ------------------------------------------------------------------

    /// Checks that cumulants taken directly from the distribution equal
    /// the cumulant-from-raw-moment relations evaluated at the
    /// distribution's raw moments.
    ///
    /// # Errors
    /// - [`Error::NonZeroResidual`] for the first index whose two
    ///   derivations differ.
    /// - Any error of the underlying transforms.
    pub fn verify_commuting_diagram<I>(
        &self,
        stencil: &Stencil,
        symbols: &DistributionSymbols,
        indices: I,
    ) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Index>,
    {
        let indices: Vec<Index> = indices.into_iter().map(Into::into).collect();
        let direct = self.cumulants_from_distribution(stencil, symbols, indices.iter())?;

        let needed: BTreeSet<MomentIndex> = indices
            .iter()
            .flat_map(Index::terms)
            .flat_map(|(m, _)| m.lower_box())
            .collect();
        let raw = self.raw_moments_from_distribution(stencil, symbols, needed)?;
        let mediated = self.relations(Relation::CumulantFromRawMoments, indices.iter(), &raw)?;

        for (index, value) in &direct {
            let other = mediated.get(index).cloned().unwrap_or_default();
            let residual = value - &other;
            if !residual.is_identically_zero() {
                return Err(Error::NonZeroResidual {
                    index: index.clone(),
                    residual,
                });
            }
        }
        debug!(count = direct.len(), "commuting diagram verified");
        Ok(())
    }

    fn lookup(&self, key: &CacheKey) -> Option<Expr> {
        if !self.config.caching {
            return None;
        }
        let hit = self.cache.get(key);
        if hit.is_some() {
            trace!(index = %key.index, kind = ?key.kind, "cache hit");
        }
        hit
    }

    fn store(&self, key: CacheKey, expr: Expr) -> Expr {
        debug!(
            index = %key.index,
            kind = ?key.kind,
            terms = expr.num_terms(),
            "derived expression"
        );
        if self.config.caching {
            self.cache.insert(key, expr)
        } else {
            expr
        }
    }
}

fn check_dim(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(Error::DimensionMismatch { expected, found });
    }
    Ok(())
}

/// Distinct monomials across all index terms, in first-seen order.
fn unique_monomials(indices: &[Index]) -> Vec<MomentIndex> {
    let mut seen = BTreeSet::new();
    indices
        .iter()
        .flat_map(Index::terms)
        .map(|(m, _)| m)
        .filter(|m| seen.insert(m.clone()))
        .collect()
}

fn assemble(indices: Vec<Index>, values: &HashMap<MomentIndex, Expr>) -> TransformationResult {
    let mut result = TransformationResult::new();
    for index in indices {
        let value: Expr = index
            .terms()
            .iter()
            .map(|(m, coeff)| values.get(m).cloned().unwrap_or_default().scale(coeff))
            .sum();
        result.insert(index, value);
    }
    result
}
