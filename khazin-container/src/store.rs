//! Instance stores.
//!
//! A store owns the instances it creates and releases them in reverse
//! creation order when dropped, so an instance never outlives the store-held
//! references of the instances built after it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::Result;
use crate::key::SlotKey;
use crate::value::{Instance, ValueBox};

/// Scope-local store, used from one thread at a time.
#[derive(Default)]
pub(crate) struct InstanceStore {
    entries: Vec<(SlotKey, Instance)>,
    index: BTreeMap<SlotKey, usize>,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, slot: &SlotKey) -> Option<Instance> {
        self.index.get(slot).map(|&i| self.entries[i].1.clone())
    }

    /// Takes ownership of `value` under `slot`.
    ///
    /// The caller has checked that `slot` is empty.
    pub fn emplace(&mut self, slot: SlotKey, value: ValueBox) -> Instance {
        let instance = value.into_instance();
        self.insert(slot, instance.clone());
        instance
    }

    fn insert(&mut self, slot: SlotKey, instance: Instance) {
        debug_assert!(!self.index.contains_key(&slot), "slot {slot} is already filled");
        trace!(slot = %slot, type_name = instance.type_name(), "Stored instance");
        self.index.insert(slot, self.entries.len());
        self.entries.push((slot, instance));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for InstanceStore {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }
        self.index.clear();
        while let Some((slot, instance)) = self.entries.pop() {
            trace!(slot = %slot, type_name = instance.type_name(), "Releasing instance");
            drop(instance);
        }
    }
}

impl fmt::Debug for InstanceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceStore")
            .field("instances", &self.entries.len())
            .finish()
    }
}

/// Provider-wide store for singletons, shared by every scope.
///
/// Each slot gets a claim cell; the first caller to reach it runs the build,
/// concurrent callers block on the cell and receive the same instance. A
/// failed build leaves the cell empty.
pub(crate) struct SingletonStore {
    // Dropped before `instances`, which then decides release order.
    claims: Mutex<BTreeMap<SlotKey, Arc<OnceCell<Instance>>>>,
    instances: Mutex<InstanceStore>,
}

impl SingletonStore {
    pub fn new() -> Self {
        Self {
            claims: Mutex::new(BTreeMap::new()),
            instances: Mutex::new(InstanceStore::new()),
        }
    }

    pub fn find(&self, slot: &SlotKey) -> Option<Instance> {
        self.instances.lock().find(slot)
    }

    /// Returns the instance in `slot`, building it with `init` if the slot
    /// has never been filled.
    ///
    /// No store lock is held while `init` runs.
    pub fn get_or_try_insert(
        &self,
        slot: &SlotKey,
        init: impl FnOnce() -> Result<ValueBox>,
    ) -> Result<Instance> {
        if let Some(instance) = self.find(slot) {
            return Ok(instance);
        }

        let claim = Arc::clone(self.claims.lock().entry(*slot).or_default());
        let instance = claim
            .get_or_try_init(|| init().map(ValueBox::into_instance))?
            .clone();

        let mut instances = self.instances.lock();
        if instances.find(slot).is_none() {
            instances.insert(*slot, instance.clone());
        }
        Ok(instance)
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }
}

impl fmt::Debug for SingletonStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonStore")
            .field("instances", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KhazinError;
    use crate::key::IdentityKey;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    /// Records its id into a shared log when dropped.
    struct Tracked {
        id: u32,
        log: Arc<Mutex<Vec<u32>>>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.log.lock().push(self.id);
        }
    }

    struct I1;
    struct I2;
    struct I3;

    fn slot<T: 'static>() -> SlotKey {
        SlotKey::primary(IdentityKey::of::<T>())
    }

    #[test]
    fn find_after_emplace() {
        let mut store = InstanceStore::new();
        assert!(store.find(&slot::<I1>()).is_none());

        let stored = store.emplace(slot::<I1>(), ValueBox::new(5u8));
        let found = store.find(&slot::<I1>()).unwrap();
        assert!(stored.ptr_eq(&found));
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn teardown_in_reverse_creation_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let mut store = InstanceStore::new();
            for (id, slot) in [(1, slot::<I1>()), (2, slot::<I2>()), (3, slot::<I3>())] {
                store.emplace(slot, ValueBox::new(Tracked { id, log: Arc::clone(&log) }));
            }
        }
        assert_eq!(*log.lock(), vec![3, 2, 1]);
    }

    #[test]
    fn outstanding_handle_outlives_store() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = {
            let mut store = InstanceStore::new();
            store
                .emplace(slot::<I1>(), ValueBox::new(Tracked { id: 1, log: Arc::clone(&log) }))
                .downcast::<Tracked>()
                .unwrap()
        };
        assert!(log.lock().is_empty());
        assert_eq!(handle.id, 1);
        drop(handle);
        assert_eq!(*log.lock(), vec![1]);
    }

    #[test]
    fn singleton_teardown_in_reverse_creation_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let store = SingletonStore::new();
            for (id, slot) in [(1, slot::<I1>()), (2, slot::<I2>()), (3, slot::<I3>())] {
                let log = Arc::clone(&log);
                store
                    .get_or_try_insert(&slot, || Ok(ValueBox::new(Tracked { id, log })))
                    .unwrap();
            }
            assert_eq!(store.len(), 3);
        }
        assert_eq!(*log.lock(), vec![3, 2, 1]);
    }

    #[test]
    fn failed_build_leaves_slot_empty() {
        let store = SingletonStore::new();
        let err = store
            .get_or_try_insert(&slot::<I1>(), || {
                Err(KhazinError::construction_failed(IdentityKey::of::<I1>(), "not yet"))
            })
            .unwrap_err();
        assert!(matches!(err, KhazinError::ConstructionFailed { .. }));
        assert!(store.find(&slot::<I1>()).is_none());

        let instance = store
            .get_or_try_insert(&slot::<I1>(), || Ok(ValueBox::new(9u32)))
            .unwrap();
        assert_eq!(*instance.downcast::<u32>().unwrap(), 9);
    }

    #[test]
    fn concurrent_first_resolution_builds_once() {
        let store = Arc::new(SingletonStore::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let builds = Arc::clone(&builds);
                thread::spawn(move || {
                    store
                        .get_or_try_insert(&slot::<I1>(), || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok(ValueBox::new(String::from("window")))
                        })
                        .unwrap()
                })
            })
            .collect();

        let instances: Vec<Instance> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| i.ptr_eq(&instances[0])));
        assert_eq!(store.len(), 1);
    }
}
