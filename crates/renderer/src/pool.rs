use std::collections::HashSet;

use tracing::{debug, warn};

use crate::backend::InstanceHandle;

/// Anything a [`ShaderPool`] can hand out. The id must be unique per
/// constructed object.
pub trait Pooled {
    fn pool_id(&self) -> InstanceHandle;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub free: usize,
    pub in_use: usize,
    pub constructed: usize,
}

/// Free list of reusable instances for one effect.
///
/// Instances are only constructed when the free list is empty, so the number
/// ever built equals the peak number in use at the same time.
#[derive(Debug)]
pub struct ShaderPool<T> {
    label: &'static str,
    free: Vec<T>,
    in_use: HashSet<InstanceHandle>,
    constructed: usize,
}

impl<T: Pooled> ShaderPool<T> {
    /// Empty pool; `label` names it in logs.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            free: Vec::new(),
            in_use: HashSet::new(),
            constructed: 0,
        }
    }

    /// Pops a free instance or builds one with `factory`.
    pub fn acquire_with<F, E>(&mut self, factory: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let item = match self.free.pop() {
            Some(item) => {
                debug!(pool = self.label, id = ?item.pool_id(), "reusing pooled instance");
                item
            }
            None => {
                let item = factory()?;
                self.constructed += 1;
                debug!(
                    pool = self.label,
                    id = ?item.pool_id(),
                    constructed = self.constructed,
                    "constructed new instance"
                );
                item
            }
        };
        self.in_use.insert(item.pool_id());
        Ok(item)
    }

    /// Returns `item` to the free list. An instance that is not currently
    /// handed out is logged and dropped instead; returns whether it was
    /// accepted.
    pub fn release(&mut self, item: T) -> bool {
        let id = item.pool_id();
        if !self.in_use.remove(&id) {
            let already_free = self.free.iter().any(|free| free.pool_id() == id);
            warn!(
                pool = self.label,
                ?id,
                already_free,
                "ignoring release of an instance that is not in use"
            );
            return false;
        }
        self.free.push(item);
        true
    }

    /// Current counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            free: self.free.len(),
            in_use: self.in_use.len(),
            constructed: self.constructed,
        }
    }

    /// Removes every free instance. Instances still in use stay tracked.
    pub fn drain_free(&mut self) -> Vec<T> {
        std::mem::take(&mut self.free)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Item(u64);

    impl Pooled for Item {
        fn pool_id(&self) -> InstanceHandle {
            InstanceHandle(self.0)
        }
    }

    fn counter_factory(next: &mut u64) -> impl FnOnce() -> Result<Item, ()> + '_ {
        move || {
            *next += 1;
            Ok(Item(*next))
        }
    }

    #[test]
    fn sequential_use_constructs_once() {
        let mut pool = ShaderPool::new("test");
        let mut next = 0;
        for _ in 0..5 {
            let item = pool.acquire_with(counter_factory(&mut next)).unwrap();
            assert!(pool.release(item));
        }
        assert_eq!(
            pool.stats(),
            PoolStats {
                free: 1,
                in_use: 0,
                constructed: 1
            }
        );
    }

    #[test]
    fn overlapping_use_constructs_high_water_mark() {
        let mut pool = ShaderPool::new("test");
        let mut next = 0;
        let held: Vec<_> = (0..3)
            .map(|_| pool.acquire_with(counter_factory(&mut next)).unwrap())
            .collect();
        assert_eq!(pool.stats().in_use, 3);
        for item in held {
            pool.release(item);
        }
        let again = pool.acquire_with(counter_factory(&mut next)).unwrap();
        pool.release(again);
        assert_eq!(pool.stats().constructed, 3);
        assert_eq!(pool.stats().free, 3);
    }

    #[test]
    fn duplicate_release_is_ignored() {
        let mut pool = ShaderPool::new("test");
        let mut next = 0;
        let item = pool.acquire_with(counter_factory(&mut next)).unwrap();
        let id = item.0;
        assert!(pool.release(item));
        assert!(!pool.release(Item(id)));
        assert!(!pool.release(Item(99)));
        assert_eq!(pool.stats().free, 1);
    }

    #[test]
    fn failed_factory_leaves_pool_unchanged() {
        let mut pool: ShaderPool<Item> = ShaderPool::new("test");
        let result: Result<Item, &str> = pool.acquire_with(|| Err("boom"));
        assert!(result.is_err());
        assert_eq!(pool.stats(), PoolStats::default());
    }
}
