//! Service scopes: resolution contexts.
//!
//! A scope resolves services against the provider's frozen registry. Scoped
//! instances live in the scope's own store, singletons in the store shared
//! with the provider and every other scope built from it. Transient values
//! are handed to the caller and never stored.
//!
//! Dropping a scope releases its scoped instances, newest first. Singletons
//! are untouched.

use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::collection::Registration;
use crate::descriptor::{Handle, Injected, LifetimeOf, ValueOf};
use crate::error::{
    CyclicDependencyError, DescriptorMismatchError, KhazinError, Result, ServiceNotFoundError,
};
use crate::graph::similar_keys;
use crate::key::{IdentityKey, SlotKey};
use crate::lifetime::{Lifetime, LifetimeKind, Resolved};
use crate::provider::Shared;
use crate::store::InstanceStore;
use crate::value::ValueBox;

/// A resolution context with its own scoped instances.
///
/// Obtained from [`ServiceProvider::create_scope`], or through
/// [`ServiceProvider::root_scope`] for the provider's implicit scope.
///
/// # Examples
/// ```rust
/// use std::sync::Arc;
/// use khazin_container::prelude::*;
///
/// # struct Session;
/// # struct Config;
/// # struct Frame;
/// type SessionService = FunctorDescriptor<Session, Scoped>;
/// type ConfigService = FunctorDescriptor<Config, Singleton>;
/// type FrameService = FunctorDescriptor<Frame, Transient>;
///
/// # fn main() -> Result<()> {
/// # let mut services = ServiceCollection::new();
/// # services
/// #     .add::<SessionService>(FunctorDescriptor::new(|_| Ok(Session)))
/// #     .add::<ConfigService>(FunctorDescriptor::new(|_| Ok(Config)))
/// #     .add::<FrameService>(FunctorDescriptor::new(|_| Ok(Frame)));
/// # let provider = services.build()?;
/// let mut request = provider.create_scope();
/// let session = request.get::<SessionService>()?;   // Arc<Session>, one per scope
/// let config = request.get::<ConfigService>()?;     // Arc<Config>, shared with the provider
/// let frame = request.get::<FrameService>()?;       // Frame, owned by the caller
///
/// let mut other = provider.create_scope();
/// assert!(!Arc::ptr_eq(&session, &other.get::<SessionService>()?));
/// assert!(Arc::ptr_eq(&config, &other.get::<ConfigService>()?));
/// # Ok(())
/// # }
/// ```
///
/// [`ServiceProvider::create_scope`]: crate::provider::ServiceProvider::create_scope
/// [`ServiceProvider::root_scope`]: crate::provider::ServiceProvider::root_scope
pub struct ServiceScope {
    // Field order matters: local instances are released before the scope lets
    // go of the shared singletons.
    instances: InstanceStore,
    /// Slots currently being built on this scope, outermost first.
    resolving: Vec<SlotKey>,
    shared: Arc<Shared>,
}

impl ServiceScope {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        debug!(registered = shared.registry.len(), "Created scope");
        Self {
            instances: InstanceStore::new(),
            resolving: Vec::new(),
            shared,
        }
    }

    /// Moves this scope, local instances included, onto other shared state.
    pub(crate) fn reparent(mut self, shared: Arc<Shared>) -> Self {
        debug!(local = self.instances.len(), "Re-parented scope");
        self.shared = shared;
        self
    }

    /// Resolves `S`.
    ///
    /// Transient services return a new value on every call. Scoped services
    /// return the same `Arc` for every call on this scope, singletons the same
    /// `Arc` for every scope of the provider.
    ///
    /// # Errors
    /// - [`KhazinError::ServiceNotFound`]: `S`, or one of its dependencies,
    ///   is not registered
    /// - [`KhazinError::DescriptorMismatch`]: `S`'s identity is registered
    ///   with another descriptor type
    /// - [`KhazinError::CyclicDependency`]: `S` depends on itself
    /// - whatever a build function reports
    ///
    /// Nothing is cached for a service whose build failed.
    pub fn get<S: Injected>(&mut self) -> Result<Handle<S>> {
        let key = S::identity();
        trace!(service = %key, "Resolving");

        self.check_descriptor::<S>(&key)?;
        let resolved = self.resolve_slot(SlotKey::primary(key))?;
        <LifetimeOf<S> as LifetimeKind>::handle::<ValueOf<S>>(resolved)
    }

    /// Returns `true` if `S` is registered with exactly `S::Descriptor`.
    /// Builds nothing.
    pub fn has<S: Injected>(&self) -> bool {
        self.shared.registry.has::<S>()
    }

    /// Number of registrations of `S`'s identity with `S::Descriptor`.
    pub fn count<S: Injected>(&self) -> usize {
        self.shared.registry.count::<S>()
    }

    /// Number of registrations of `S`'s value type under any key, with
    /// `S::Descriptor`.
    pub fn count_all<S: Injected>(&self) -> usize {
        self.matching_slots_of_type::<S>().len()
    }

    /// Resolves every registration of `S`'s identity, in registration order,
    /// and hands each handle to `visit`.
    ///
    /// Stops at the first failing resolution and returns its error.
    pub fn for_each<S: Injected>(&mut self, mut visit: impl FnMut(Handle<S>)) -> Result<()> {
        let key = S::identity();
        let wanted = TypeId::of::<S::Descriptor>();
        let slots: Vec<SlotKey> = self
            .shared
            .registry
            .bucket(&key)
            .iter()
            .enumerate()
            .filter(|(_, r)| r.descriptor.descriptor_type() == wanted)
            .map(|(index, _)| SlotKey::new(key, index))
            .collect();

        trace!(service = %key, registrations = slots.len(), "Visiting registrations");
        self.visit_slots::<S>(slots, &mut visit)
    }

    /// Like [`for_each`](Self::for_each), across every key of `S`'s value
    /// type, in overall registration order.
    pub fn for_each_all<S: Injected>(&mut self, mut visit: impl FnMut(Handle<S>)) -> Result<()> {
        let slots = self.matching_slots_of_type::<S>();
        trace!(
            value = type_name::<ValueOf<S>>(),
            registrations = slots.len(),
            "Visiting registrations of every key"
        );
        self.visit_slots::<S>(slots, &mut visit)
    }

    /// Number of scoped instances this scope owns.
    pub fn local_len(&self) -> usize {
        self.instances.len()
    }

    // ═══════════════════════════════════════════
    // Resolution
    // ═══════════════════════════════════════════

    fn visit_slots<S: Injected>(
        &mut self,
        slots: Vec<SlotKey>,
        visit: &mut impl FnMut(Handle<S>),
    ) -> Result<()> {
        for slot in slots {
            let resolved = self.resolve_slot(slot)?;
            visit(<LifetimeOf<S> as LifetimeKind>::handle::<ValueOf<S>>(resolved)?);
        }
        Ok(())
    }

    fn matching_slots_of_type<S: Injected>(&self) -> Vec<SlotKey> {
        let wanted = TypeId::of::<S::Descriptor>();
        self.shared
            .registry
            .slots_of_type(TypeId::of::<ValueOf<S>>())
            .into_iter()
            .filter(|(_, r)| r.descriptor.descriptor_type() == wanted)
            .map(|(slot, _)| slot)
            .collect()
    }

    fn check_descriptor<S: Injected>(&self, key: &IdentityKey) -> Result<()> {
        let Some(registration) = self.shared.registry.primary(key) else {
            return Err(self.not_found(key));
        };

        if registration.descriptor.descriptor_type() != TypeId::of::<S::Descriptor>() {
            return Err(KhazinError::DescriptorMismatch(DescriptorMismatchError {
                key: *key,
                requested: type_name::<S::Descriptor>(),
                registered: registration.descriptor.descriptor_name(),
                required_by: self.resolving.last().map(|slot| slot.identity),
            }));
        }

        Ok(())
    }

    fn resolve_slot(&mut self, slot: SlotKey) -> Result<Resolved> {
        if let Some(start) = self.resolving.iter().position(|s| *s == slot) {
            let mut chain: Vec<IdentityKey> =
                self.resolving[start..].iter().map(|s| s.identity).collect();
            chain.push(slot.identity);
            return Err(KhazinError::CyclicDependency(CyclicDependencyError { chain }));
        }

        let shared = Arc::clone(&self.shared);
        let Some(registration) = shared.registry.registration(&slot) else {
            return Err(self.not_found(&slot.identity));
        };

        match registration.descriptor.lifetime() {
            Lifetime::Transient => {
                trace!(slot = %slot, "Building transient");
                self.build(slot, registration).map(Resolved::Fresh)
            }
            Lifetime::Scoped => {
                if let Some(instance) = self.instances.find(&slot) {
                    trace!(slot = %slot, "Scoped instance found");
                    return Ok(Resolved::Cached(instance));
                }
                let value = self.build(slot, registration)?;
                debug!(slot = %slot, "Constructed scoped instance");
                Ok(Resolved::Cached(self.instances.emplace(slot, value)))
            }
            Lifetime::Singleton => {
                let instance = shared.singletons.get_or_try_insert(&slot, || {
                    let value = self.build(slot, registration)?;
                    debug!(slot = %slot, "Constructed singleton");
                    Ok(value)
                })?;
                Ok(Resolved::Cached(instance))
            }
        }
    }

    fn build(&mut self, slot: SlotKey, registration: &Registration) -> Result<ValueBox> {
        self.resolving.push(slot);
        let result = registration.descriptor.load_boxed(self);
        self.resolving.pop();
        result
    }

    fn not_found(&self, key: &IdentityKey) -> KhazinError {
        let required_by = self.resolving.last().map(|slot| slot.identity);
        debug!(service = %key, required_by = ?required_by, "Service not found");
        KhazinError::ServiceNotFound(ServiceNotFoundError {
            requested: *key,
            required_by,
            suggestions: similar_keys(key, self.shared.registry.registered_keys()),
        })
    }
}

impl fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceScope")
            .field("local", &self.instances.len())
            .field("singletons", &self.shared.singletons.len())
            .field("resolving", &self.resolving.len())
            .finish()
    }
}
