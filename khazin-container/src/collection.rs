//! Service collection: the registry of descriptors.
//!
//! The collection maps each [`IdentityKey`] to the descriptors registered
//! under it. It is populated before resolution starts; building a
//! [`ServiceProvider`] takes ownership of it and freezes it.
//!
//! An identity may hold several registrations. They keep registration order,
//! which is the order `for_each` visits them in; `get` resolves the first.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use khazin_support::rendering::{RegistrationRow, render_registrations};
use tracing::{debug, trace};

use crate::descriptor::{ErasedDescriptor, Injected};
use crate::error::Result;
use crate::key::{IdentityKey, SlotKey};
use crate::module::ServiceModule;
use crate::provider::{ProviderOptions, ServiceProvider};

/// What [`ServiceCollection::add`] does when the identity is already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationPolicy {
    /// Keep earlier registrations and append the new one after them.
    #[default]
    Append,
    /// Drop earlier registrations of the identity.
    Replace,
}

/// A single registered descriptor.
#[derive(Clone)]
pub(crate) struct Registration {
    pub descriptor: Arc<dyn ErasedDescriptor>,
    /// Position in overall registration order.
    pub sequence: u64,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("descriptor", &self.descriptor.descriptor_name())
            .field("value", &self.descriptor.value_name())
            .field("lifetime", &self.descriptor.lifetime())
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Registry of service descriptors.
///
/// # Examples
/// ```rust
/// use std::sync::Arc;
/// use khazin_container::prelude::*;
///
/// # struct Window { title: String }
/// # impl Construct<(), &'static str> for Window {
/// #     fn construct((): (), title: &'static str) -> Self { Window { title: title.into() } }
/// # }
/// # struct Engine { window: Arc<Window> }
/// # impl Construct<(Arc<Window>,)> for Engine {
/// #     fn construct((window,): (Arc<Window>,), (): ()) -> Self { Engine { window } }
/// # }
/// # struct Clock;
/// # impl Construct<()> for Clock {
/// #     fn construct((): (), (): ()) -> Self { Clock }
/// # }
/// khazin_container::service! {
///     WindowService => LocalDescriptor<Window, Singleton>;
///     EngineService => LocalDescriptor<Engine, Scoped, (WindowService,)>;
///     ClockService => LocalDescriptor<Clock, Singleton>;
/// }
///
/// # fn main() -> Result<()> {
/// let mut services = ServiceCollection::new();
/// services
///     .add::<WindowService>(LocalDescriptor::with_args("main"))
///     .add_default::<EngineService>();
///
/// // Defaults that a host may already have provided
/// services.emplace_default::<ClockService>();
///
/// let mut provider = services.build()?;
/// assert_eq!(provider.get::<EngineService>()?.window.title, "main");
/// # Ok(())
/// # }
/// ```
pub struct ServiceCollection {
    services: BTreeMap<IdentityKey, Vec<Registration>>,
    policy: RegistrationPolicy,
    next_sequence: u64,
}

impl ServiceCollection {
    /// Creates an empty collection that appends repeated registrations.
    pub fn new() -> Self {
        Self::with_policy(RegistrationPolicy::default())
    }

    pub fn with_policy(policy: RegistrationPolicy) -> Self {
        Self {
            services: BTreeMap::new(),
            policy,
            next_sequence: 0,
        }
    }

    pub fn policy(&self) -> RegistrationPolicy {
        self.policy
    }

    /// Registers `descriptor` for `S`, unconditionally.
    ///
    /// Under [`RegistrationPolicy::Append`] an existing registration of the
    /// same identity stays first in line; under [`RegistrationPolicy::Replace`]
    /// it is dropped.
    pub fn add<S: Injected>(&mut self, descriptor: S::Descriptor) -> &mut Self {
        let key = S::identity();
        let registration = self.make_registration(descriptor);
        let bucket = self.services.entry(key).or_default();

        if self.policy == RegistrationPolicy::Replace && !bucket.is_empty() {
            trace!(key = %key, dropped = bucket.len(), "Replacing registrations");
            bucket.clear();
        }

        debug!(
            key = %key,
            lifetime = %registration.descriptor.lifetime(),
            index = bucket.len(),
            "Registered service"
        );
        bucket.push(registration);
        self
    }

    /// Registers the default descriptor for `S`.
    pub fn add_default<S: Injected>(&mut self) -> &mut Self
    where
        S::Descriptor: Default,
    {
        self.add::<S>(<S::Descriptor as Default>::default())
    }

    /// Registers `descriptor` only if `S`'s identity has no registration yet.
    ///
    /// Returns `true` if the descriptor was inserted. An existing registration
    /// is left untouched, whatever its descriptor type.
    pub fn emplace<S: Injected>(&mut self, descriptor: S::Descriptor) -> bool {
        let key = S::identity();
        if self.contains(&key) {
            trace!(key = %key, "Already registered, emplace skipped");
            return false;
        }

        let registration = self.make_registration(descriptor);
        debug!(key = %key, lifetime = %registration.descriptor.lifetime(), "Emplaced service");
        self.services.insert(key, vec![registration]);
        true
    }

    /// [`emplace`](Self::emplace) with the default descriptor.
    pub fn emplace_default<S: Injected>(&mut self) -> bool
    where
        S::Descriptor: Default,
    {
        self.emplace::<S>(<S::Descriptor as Default>::default())
    }

    /// Returns `true` if `S` is registered with exactly `S::Descriptor`.
    ///
    /// A registration of the same identity through another descriptor type
    /// does not count; [`contains`](Self::contains) ignores the descriptor.
    pub fn has<S: Injected>(&self) -> bool {
        self.primary(&S::identity())
            .is_some_and(|r| r.descriptor.descriptor_type() == TypeId::of::<S::Descriptor>())
    }

    /// Returns `true` if anything is registered under `key`.
    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.services.get(key).is_some_and(|bucket| !bucket.is_empty())
    }

    /// Number of registrations of `S` with exactly `S::Descriptor`.
    pub fn count<S: Injected>(&self) -> usize {
        let wanted = TypeId::of::<S::Descriptor>();
        self.bucket(&S::identity())
            .iter()
            .filter(|r| r.descriptor.descriptor_type() == wanted)
            .count()
    }

    /// Total number of registrations.
    pub fn len(&self) -> usize {
        self.services.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lets `module` register its services.
    pub fn add_module(&mut self, module: &dyn ServiceModule) -> &mut Self {
        debug!(module = module.name(), "Adding module");
        module.register(self);
        self
    }

    /// Renders every registration on its own line, in registration order.
    pub fn describe(&self) -> String {
        let mut all: Vec<(&IdentityKey, &Registration)> = self
            .services
            .iter()
            .flat_map(|(key, bucket)| bucket.iter().map(move |r| (key, r)))
            .collect();
        all.sort_by_key(|(_, r)| r.sequence);

        let rows: Vec<RegistrationRow> = all
            .into_iter()
            .map(|(key, r)| RegistrationRow {
                lifetime: r.descriptor.lifetime().to_string(),
                type_name: key.type_name().to_string(),
                key: key.name().map(str::to_string),
                dependencies: r.descriptor.dependencies().len(),
            })
            .collect();

        render_registrations(&rows)
    }

    /// Builds a provider with default options.
    ///
    /// # Errors
    /// See [`ServiceProvider::new`].
    pub fn build(self) -> Result<ServiceProvider> {
        ServiceProvider::new(self)
    }

    /// Builds a provider with explicit options.
    pub fn build_with(self, options: ProviderOptions) -> Result<ServiceProvider> {
        ServiceProvider::with_options(self, options)
    }

    // ── Lookups used by scopes and validation ──

    pub(crate) fn bucket(&self, key: &IdentityKey) -> &[Registration] {
        self.services.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn primary(&self, key: &IdentityKey) -> Option<&Registration> {
        self.bucket(key).first()
    }

    pub(crate) fn registration(&self, slot: &SlotKey) -> Option<&Registration> {
        self.bucket(&slot.identity).get(slot.index)
    }

    /// Every registration whose value type is `type_id`, across all keys,
    /// in registration order.
    pub(crate) fn slots_of_type(&self, type_id: TypeId) -> Vec<(SlotKey, &Registration)> {
        let mut slots: Vec<(SlotKey, &Registration)> = self
            .services
            .range(IdentityKey::first_of(type_id)..)
            .take_while(|(key, _)| key.type_id() == type_id)
            .flat_map(|(key, bucket)| {
                bucket
                    .iter()
                    .enumerate()
                    .map(move |(index, r)| (SlotKey::new(*key, index), r))
            })
            .collect();
        slots.sort_by_key(|(_, r)| r.sequence);
        slots
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&IdentityKey, &[Registration])> {
        self.services.iter().map(|(key, bucket)| (key, bucket.as_slice()))
    }

    pub(crate) fn registered_keys(&self) -> Vec<IdentityKey> {
        self.services.keys().copied().collect()
    }

    fn make_registration<D: ErasedDescriptor + 'static>(&mut self, descriptor: D) -> Registration {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Registration {
            descriptor: Arc::new(descriptor),
            sequence,
        }
    }
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCollection")
            .field("registered", &self.len())
            .field("policy", &self.policy)
            .finish()
    }
}
