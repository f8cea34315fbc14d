//! Memo table for derived expressions.
//!
//! Entries are keyed by what they were derived from: the stencil signature
//! (velocities, distribution symbols, explicit mean) for distribution-based
//! transforms, or nothing for the symbol-only moment/cumulant relations,
//! plus the monomial index and the transform kind.
//!
//! The table only grows; [`TransformCache::clear`] resets it.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::index::MomentIndex;
use crate::stencil::{DistributionSymbols, Stencil};
use crate::symbolic::Expr;

/// Which derivation produced a cached expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    RawMomentFromDistribution,
    CentralMomentFromDistribution,
    CumulantFromDistribution,
    CumulantFromRawMoments,
    RawMomentFromCumulants,
    CumulantFromCentralMoments,
    CentralMomentFromCumulants,
}

/// Inputs that distribution-based transforms depend on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StencilSignature {
    pub stencil: Stencil,
    pub symbols: DistributionSymbols,
    /// Explicit mean velocity; `None` for the default `m_1 / m_0`.
    pub mean: Option<Vec<Expr>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub signature: Option<StencilSignature>,
    pub index: MomentIndex,
    pub kind: TransformKind,
}

/// Thread-safe insert-if-absent expression cache.
#[derive(Debug, Default)]
pub struct TransformCache {
    entries: RwLock<HashMap<CacheKey, Expr>>,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Expr> {
        self.entries.read().get(key).cloned()
    }

    /// Stores `value` unless an entry already exists, and returns the
    /// stored expression.
    ///
    /// Two threads racing on the same miss compute equal values, so keeping
    /// whichever lands first is safe.
    pub fn insert(&self, key: CacheKey, value: Expr) -> Expr {
        self.entries.write().entry(key).or_insert(value).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(index: MomentIndex) -> CacheKey {
        CacheKey {
            signature: None,
            index,
            kind: TransformKind::CumulantFromRawMoments,
        }
    }

    #[test]
    fn test_insert_if_absent() {
        let cache = TransformCache::new();
        let k = key(MomentIndex::from((1, 0)));
        assert_eq!(cache.insert(k.clone(), Expr::symbol("a")), Expr::symbol("a"));
        assert_eq!(cache.insert(k.clone(), Expr::symbol("b")), Expr::symbol("a"));
        assert_eq!(cache.get(&k), Some(Expr::symbol("a")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_kind_separates_entries() {
        let cache = TransformCache::new();
        let mut k = key(MomentIndex::from((1, 0)));
        cache.insert(k.clone(), Expr::one());
        k.kind = TransformKind::RawMomentFromCumulants;
        assert!(cache.get(&k).is_none());
    }

    #[test]
    fn test_clear() {
        let cache = TransformCache::new();
        cache.insert(key(MomentIndex::from((0, 0))), Expr::one());
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_inserts_agree() {
        let cache = TransformCache::new();
        let k = key(MomentIndex::from((2, 0)));
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| cache.insert(k.clone(), Expr::symbol("m_2_0")));
            }
        });
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&k), Some(Expr::symbol("m_2_0")));
    }
}
