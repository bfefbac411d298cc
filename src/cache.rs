//! Cycle-scoped cache shared by all producers within one polling pass.
//!
//! Each producer reaches the cache through a typed [`CacheHandle`] whose
//! namespace is a type implementing [`CacheNamespace`], so two producers can
//! never collide on a key. Entries are computed at most once per
//! `(namespace, instance)` pair and the whole cache is dropped by its owner
//! at the end of the cycle.

use ahash::AHashMap as HashMap;
use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

/// A producer-owned partition of the cycle cache.
pub trait CacheNamespace: 'static {
    /// Human-readable namespace name, used in logs only.
    const NAME: &'static str;

    type Value: Clone + Send + Sync + 'static;
}

type Entry = Box<dyn Any + Send + Sync>;
type Slot = Arc<Mutex<Option<Entry>>>;

/// Per-cycle store keyed by namespace and instance name.
#[derive(Default)]
pub struct CycleCache {
    slots: Mutex<HashMap<(TypeId, String), Slot>>,
}

impl CycleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for namespace `N`.
    pub fn handle<N: CacheNamespace>(&self) -> CacheHandle<'_, N> {
        CacheHandle {
            cache: self,
            _namespace: PhantomData,
        }
    }

    /// Number of `(namespace, instance)` slots touched this cycle.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // The map lock is only held to find the slot; computing happens under
    // the slot's own lock so different keys never wait on each other.
    fn slot(&self, namespace: TypeId, instance_name: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry((namespace, instance_name.to_string()))
            .or_default()
            .clone()
    }
}

/// Typed view of one namespace of a [`CycleCache`].
pub struct CacheHandle<'a, N> {
    cache: &'a CycleCache,
    _namespace: PhantomData<fn() -> N>,
}

impl<N: CacheNamespace> CacheHandle<'_, N> {
    pub fn get(&self, instance_name: &str) -> Option<N::Value> {
        let slot = self.cache.slot(TypeId::of::<N>(), instance_name);
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let value = guard
            .as_ref()
            .and_then(|entry| entry.downcast_ref::<N::Value>())
            .cloned();
        value
    }

    /// Returns the cached value for `instance_name`, computing and storing it
    /// first if absent. A failed computation stores nothing.
    pub fn get_or_compute<E, F>(&self, instance_name: &str, compute: F) -> Result<N::Value, E>
    where
        F: FnOnce() -> Result<N::Value, E>,
    {
        let slot = self.cache.slot(TypeId::of::<N>(), instance_name);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(value) = guard
            .as_ref()
            .and_then(|entry| entry.downcast_ref::<N::Value>())
        {
            return Ok(value.clone());
        }

        trace!("Cycle cache miss for {}/{}", N::NAME, instance_name);
        let value = compute()?;
        *guard = Some(Box::new(value.clone()));
        Ok(value)
    }
}
