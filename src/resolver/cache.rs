use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::component::{ComponentKind, Instance};

type Slots = HashMap<ComponentKind, HashMap<String, Arc<Instance>>>;

/// Per-chain instance cache: kind → name → instance.
///
/// Owned by one resolution chain and dropped with it. The lock is never held
/// while a constructor runs, so constructors may resolve other components.
#[derive(Clone, Default)]
pub struct SingletonCache {
    slots: Arc<Mutex<Slots>>,
}

impl SingletonCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, kind: ComponentKind, name: &str) -> Option<Arc<Instance>> {
        self.slots
            .lock()
            .get(&kind)
            .and_then(|by_name| by_name.get(name))
            .map(Arc::clone)
    }

    #[must_use]
    pub fn contains(&self, kind: ComponentKind, name: &str) -> bool {
        self.slots
            .lock()
            .get(&kind)
            .is_some_and(|by_name| by_name.contains_key(name))
    }

    /// Store an instance, returning the one it replaced.
    pub fn insert(
        &self,
        kind: ComponentKind,
        name: &str,
        instance: Arc<Instance>,
    ) -> Option<Arc<Instance>> {
        self.slots
            .lock()
            .entry(kind)
            .or_default()
            .insert(name.to_string(), instance)
    }

    /// Number of cached instances of one kind.
    #[must_use]
    pub fn len(&self, kind: ComponentKind) -> usize {
        self.slots.lock().get(&kind).map_or(0, HashMap::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().values().all(HashMap::is_empty)
    }

    pub(crate) fn downgrade(&self) -> WeakSingletonCache {
        WeakSingletonCache {
            slots: Arc::downgrade(&self.slots),
        }
    }
}

impl fmt::Debug for SingletonCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        let mut map = f.debug_map();
        for (kind, by_name) in slots.iter() {
            let mut names: Vec<&str> = by_name.keys().map(String::as_str).collect();
            names.sort_unstable();
            map.entry(kind, &names);
        }
        map.finish()
    }
}

/// Non-owning link from an instance back to its chain cache.
#[derive(Clone)]
pub(crate) struct WeakSingletonCache {
    slots: Weak<Mutex<Slots>>,
}

impl WeakSingletonCache {
    pub(crate) fn upgrade(&self) -> Option<SingletonCache> {
        self.slots.upgrade().map(|slots| SingletonCache { slots })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache() {
        let cache = SingletonCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.len(ComponentKind::Controller), 0);
        assert!(cache.get(ComponentKind::Model, "Pets").is_none());
    }

    #[test]
    fn test_weak_link_dies_with_cache() {
        let cache = SingletonCache::new();
        let weak = cache.downgrade();
        assert!(weak.upgrade().is_some());
        drop(cache);
        assert!(weak.upgrade().is_none());
    }
}
