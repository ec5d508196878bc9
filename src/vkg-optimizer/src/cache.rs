//! Cache of optimized queries, keyed by the input query.
//!
//! Insertion is idempotent: two threads optimizing the same query may both
//! compute it, and either result is kept since both are structurally equal.

use std::collections::HashMap;
use std::sync::RwLock;

use common_error::{VkgError, VkgResult};
use vkg_iq::Iq;

use crate::rules::Optimizer;

/// A thread-safe map from input queries to optimized queries.
pub trait QueryCache: Send + Sync {
    fn get(&self, query: &Iq) -> VkgResult<Option<Iq>>;

    fn put(&self, query: Iq, optimized: Iq) -> VkgResult<()>;

    fn clear(&self) -> VkgResult<()>;

    /// The cached result for `query`, optimizing and caching it when absent.
    fn get_or_optimize(&self, query: Iq, optimizer: &Optimizer) -> VkgResult<Iq> {
        if let Some(optimized) = self.get(&query)? {
            return Ok(optimized);
        }
        let optimized = optimizer.optimize(query.clone())?.query;
        self.put(query, optimized.clone())?;
        Ok(optimized)
    }
}

/// Unbounded in-memory [`QueryCache`].
#[derive(Debug, Default)]
pub struct BasicQueryCache {
    entries: RwLock<HashMap<Iq, Iq>>,
}

impl BasicQueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> VkgResult<usize> {
        Ok(self.entries.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> VkgResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl QueryCache for BasicQueryCache {
    fn get(&self, query: &Iq) -> VkgResult<Option<Iq>> {
        Ok(self.entries.read().map_err(poisoned)?.get(query).cloned())
    }

    fn put(&self, query: Iq, optimized: Iq) -> VkgResult<()> {
        self.entries
            .write()
            .map_err(poisoned)?
            .entry(query)
            .or_insert(optimized);
        Ok(())
    }

    fn clear(&self) -> VkgResult<()> {
        self.entries.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

fn poisoned<T>(_: T) -> VkgError {
    VkgError::internal("query cache lock poisoned")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use common_config::{IqSettings, OptimizationConfig};
    use vkg_core::{Expression, IntensionalPredicate, Term, Variable};
    use vkg_iq::IqFactory;

    use super::*;

    fn null_filter_query() -> Iq {
        let factory = IqFactory::new(IqSettings::testing());
        let atom = factory
            .create_intensional(IntensionalPredicate::new("person", 1), vec![Term::var("x")])
            .unwrap();
        let tree = factory
            .create_filter(Expression::eq(Term::var("x"), Term::null()), atom)
            .unwrap();
        Iq::new(vec![Variable::new("x")], tree).unwrap()
    }

    #[test]
    fn test_get_or_optimize_caches() {
        let cache = BasicQueryCache::new();
        let optimizer = Optimizer::standard(
            IqFactory::new(IqSettings::testing()),
            OptimizationConfig::default(),
        );
        assert!(cache.is_empty().unwrap());

        let optimized = cache
            .get_or_optimize(null_filter_query(), &optimizer)
            .unwrap();
        assert!(optimized.tree().is_declared_as_empty());
        assert_eq!(cache.len().unwrap(), 1);
        assert_eq!(cache.get(&null_filter_query()).unwrap(), Some(optimized));

        cache.clear().unwrap();
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_first_insertion_wins() {
        let cache = BasicQueryCache::new();
        let query = null_filter_query();
        cache.put(query.clone(), query.clone()).unwrap();
        cache
            .put(query.clone(), query.normalize_for_optimization(&IqFactory::default()).unwrap())
            .unwrap();

        assert_eq!(cache.get(&query).unwrap(), Some(query));
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(BasicQueryCache::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    cache
                        .get_or_optimize(null_filter_query(), &Optimizer::default())
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<Iq> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.len().unwrap(), 1);
    }
}
