//! # The provider: heart of Khazin
//!
//! A [`ServiceProvider`] owns the frozen registry and the singleton store, and
//! resolves through an implicit root scope. Further scopes share both.
//!
//! ```text
//! ServiceCollection  ──build()──>  ServiceProvider ── root scope
//!                                        │
//!                                  create_scope()
//!                                        │
//!                                        ▼
//!                                  ServiceScope (own scoped instances)
//! ```
//!
//! # Examples
//! ```rust
//! use khazin_container::prelude::*;
//!
//! struct Window {
//!     title: String,
//! }
//!
//! impl Construct<(), &'static str> for Window {
//!     fn construct((): (), title: &'static str) -> Self {
//!         Window { title: title.into() }
//!     }
//! }
//!
//! khazin_container::service! {
//!     WindowService => LocalDescriptor<Window, Singleton>;
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add::<WindowService>(LocalDescriptor::with_args("main"));
//!
//! let mut provider = services.build().expect("valid registrations");
//! let window = provider.get::<WindowService>().expect("registered");
//! assert_eq!(window.title, "main");
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::collection::ServiceCollection;
use crate::descriptor::{Handle, Injected};
use crate::error::Result;
use crate::graph::GraphValidator;
use crate::scope::ServiceScope;
use crate::store::SingletonStore;

/// Options applied when a provider is built.
///
/// ```
/// use khazin_container::provider::ProviderOptions;
///
/// let options = ProviderOptions::default().strict_lifetimes(true);
/// assert!(options.validates_on_build());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderOptions {
    validate_on_build: bool,
    strict_lifetimes: bool,
}

impl ProviderOptions {
    /// Validate the dependency graph when the provider is built.
    /// On by default.
    pub fn validate_on_build(mut self, validate: bool) -> Self {
        self.validate_on_build = validate;
        self
    }

    /// Reject services that depend on shorter-lived services.
    /// Off by default; only checked when validation runs.
    pub fn strict_lifetimes(mut self, strict: bool) -> Self {
        self.strict_lifetimes = strict;
        self
    }

    pub fn validates_on_build(&self) -> bool {
        self.validate_on_build
    }

    pub fn has_strict_lifetimes(&self) -> bool {
        self.strict_lifetimes
    }
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            validate_on_build: true,
            strict_lifetimes: false,
        }
    }
}

/// State shared by a provider and every scope created from it.
pub(crate) struct Shared {
    pub registry: ServiceCollection,
    pub singletons: SingletonStore,
    pub options: ProviderOptions,
}

/// The resolution root.
///
/// Resolving through the provider itself uses its root scope, so scoped
/// services resolved there live as long as the provider. Singletons live until
/// the provider and every scope created from it are gone.
pub struct ServiceProvider {
    root: ServiceScope,
    shared: Arc<Shared>,
}

impl ServiceProvider {
    /// Builds a provider with [`ProviderOptions::default`].
    ///
    /// # Errors
    /// With validation on, [`KhazinError::ServiceNotFound`] for a declared
    /// dependency nobody registered and [`KhazinError::CyclicDependency`] for
    /// a cycle.
    ///
    /// [`KhazinError::ServiceNotFound`]: crate::error::KhazinError::ServiceNotFound
    /// [`KhazinError::CyclicDependency`]: crate::error::KhazinError::CyclicDependency
    pub fn new(services: ServiceCollection) -> Result<Self> {
        Self::with_options(services, ProviderOptions::default())
    }

    /// Builds a provider with explicit options.
    #[instrument(skip(services), name = "provider_build")]
    pub fn with_options(services: ServiceCollection, options: ProviderOptions) -> Result<Self> {
        info!(registered = services.len(), "Building provider");

        if options.validate_on_build {
            GraphValidator::from_collection(&services, options.strict_lifetimes).validate()?;
        } else {
            debug!("Graph validation skipped");
        }

        let shared = Arc::new(Shared {
            registry: services,
            singletons: SingletonStore::new(),
            options,
        });
        let root = ServiceScope::new(Arc::clone(&shared));

        info!("Provider built");
        Ok(Self { root, shared })
    }

    /// Resolves `S` from the root scope. See [`ServiceScope::get`].
    pub fn get<S: Injected>(&mut self) -> Result<Handle<S>> {
        self.root.get::<S>()
    }

    pub fn has<S: Injected>(&self) -> bool {
        self.root.has::<S>()
    }

    pub fn count<S: Injected>(&self) -> usize {
        self.root.count::<S>()
    }

    pub fn count_all<S: Injected>(&self) -> usize {
        self.root.count_all::<S>()
    }

    /// See [`ServiceScope::for_each`].
    pub fn for_each<S: Injected>(&mut self, visit: impl FnMut(Handle<S>)) -> Result<()> {
        self.root.for_each::<S>(visit)
    }

    /// See [`ServiceScope::for_each_all`].
    pub fn for_each_all<S: Injected>(&mut self, visit: impl FnMut(Handle<S>)) -> Result<()> {
        self.root.for_each_all::<S>(visit)
    }

    /// The implicit scope the provider resolves through.
    pub fn root_scope(&mut self) -> &mut ServiceScope {
        &mut self.root
    }

    /// Creates an empty scope over this provider's registry and singletons.
    pub fn create_scope(&self) -> ServiceScope {
        ServiceScope::new(Arc::clone(&self.shared))
    }

    /// Moves `scope` onto this provider, keeping its scoped instances.
    ///
    /// Later resolutions through the returned scope use this provider's
    /// registry and singletons.
    pub fn adopt_scope(&self, scope: ServiceScope) -> ServiceScope {
        scope.reparent(Arc::clone(&self.shared))
    }

    pub fn options(&self) -> ProviderOptions {
        self.shared.options
    }

    /// Number of singletons constructed so far.
    pub fn singleton_count(&self) -> usize {
        self.shared.singletons.len()
    }

    /// Renders the registrations, one per line. See
    /// [`ServiceCollection::describe`].
    pub fn describe(&self) -> String {
        self.shared.registry.describe()
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("registered", &self.shared.registry.len())
            .field("singletons", &self.shared.singletons.len())
            .field("options", &self.shared.options)
            .finish()
    }
}

/// Everything needed to declare, register and resolve services.
pub mod prelude {
    pub use super::{ProviderOptions, ServiceProvider};
    pub use crate::collection::{RegistrationPolicy, ServiceCollection};
    pub use crate::descriptor::{
        Construct, ExclusiveDescriptor, FunctorDescriptor, Handle, Injected, LocalDescriptor,
        ServiceDescriptor, SharedDescriptor,
    };
    pub use crate::error::{KhazinError, Result};
    pub use crate::key::IdentityKey;
    pub use crate::lifetime::{Lifetime, Scoped, Singleton, Transient};
    pub use crate::module::ServiceModule;
    pub use crate::scope::ServiceScope;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
