use std::sync::Arc;

use moka::sync::Cache;
use tracing::debug;

use super::{error::PlannerError, plan_nodes::OperationPlan};

type CachedPlan = Result<Arc<OperationPlan>, PlannerError>;

/// Plans keyed by the hash of the normalized operation.
///
/// Concurrent misses on the same key wait for a single planning run. Failures that depend
/// only on the operation and the schema are cached next to the plans, cancellations are not.
#[derive(Clone)]
pub struct PlanCache {
    cache: Cache<u64, CachedPlan>,
}

impl PlanCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::new(max_capacity),
        }
    }

    pub fn get_or_plan<F>(&self, key: u64, plan: F) -> Result<Arc<OperationPlan>, PlannerError>
    where
        F: FnOnce() -> Result<OperationPlan, PlannerError>,
    {
        let mut computed = false;
        let cached = self.cache.try_get_with(key, || {
            computed = true;
            match plan() {
                Ok(plan) => Ok(Ok(Arc::new(plan))),
                Err(err) if err.is_transient() => Err(err),
                Err(err) => Ok(Err(err)),
            }
        });

        if computed {
            debug!(key, "plan cache miss");
        } else {
            debug!(key, "plan cache hit");
        }

        match cached {
            Ok(result) => result,
            Err(err) => Err(err.as_ref().clone()),
        }
    }

    pub fn contains(&self, key: u64) -> bool {
        self.cache.contains_key(&key)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::PlanCache;
    use crate::{
        ast::operation::OperationKind,
        planner::{error::PlannerError, plan_nodes::OperationPlan},
        utils::cancellation::CancellationError,
    };

    fn empty_plan() -> OperationPlan {
        OperationPlan {
            operation_kind: OperationKind::Query,
            nodes: vec![],
        }
    }

    #[test]
    fn plans_once_per_key() {
        let cache = PlanCache::new(10);
        let runs = Cell::new(0);
        let plan = || {
            runs.set(runs.get() + 1);
            Ok(empty_plan())
        };

        let first = cache.get_or_plan(1, plan).expect("to plan");
        let second = cache.get_or_plan(1, plan).expect("to plan");

        assert_eq!(runs.get(), 1);
        assert_eq!(first, second);
        assert!(cache.contains(1));
    }

    #[test]
    fn caches_deterministic_errors() {
        let cache = PlanCache::new(10);
        let runs = Cell::new(0);
        let plan = || {
            runs.set(runs.get() + 1);
            Err(PlannerError::EmptyPlan)
        };

        assert_eq!(cache.get_or_plan(7, plan), Err(PlannerError::EmptyPlan));
        assert_eq!(cache.get_or_plan(7, plan), Err(PlannerError::EmptyPlan));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn does_not_cache_cancellation() {
        let cache = PlanCache::new(10);

        assert_eq!(
            cache.get_or_plan(3, || Err(CancellationError::TimedOut.into())),
            Err(PlannerError::Cancelled(CancellationError::TimedOut))
        );
        assert!(!cache.contains(3));

        assert!(cache.get_or_plan(3, || Ok(empty_plan())).is_ok());
        assert!(cache.contains(3));
    }
}
