//! Service descriptors: recipes for building a service value.
//!
//! A descriptor knows three things about a service:
//! - the value it produces ([`ServiceDescriptor::Value`])
//! - how long that value lives ([`ServiceDescriptor::Lifetime`])
//! - which other services it needs, in order ([`ServiceDescriptor::Dependencies`])
//!
//! Four storage strategies are provided, independent of lifetime:
//!
//! | descriptor                | value      | built from                                  |
//! |---------------------------|------------|---------------------------------------------|
//! | [`ExclusiveDescriptor`]   | `Box<T>`   | [`Construct`] or a build function           |
//! | [`SharedDescriptor`]      | `Arc<T>`   | [`Construct`] or a build function           |
//! | [`LocalDescriptor`]       | `T`        | [`Construct`] or a build function           |
//! | [`FunctorDescriptor`]     | any `V`    | a build function                            |
//!
//! Services are requested through an [`Injected`] declaration, which pairs a
//! descriptor type with an optional key. Every descriptor type is also an
//! unkeyed declaration of itself; keyed or named declarations are written
//! with [`service!`](crate::service).
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use khazin_container::prelude::*;
//! use khazin_container::service;
//!
//! pub struct Window { title: String }
//! pub struct Engine { window: Arc<Window>, fps: u32 }
//!
//! impl Construct<(), &'static str> for Window {
//!     fn construct((): (), title: &'static str) -> Self {
//!         Window { title: title.into() }
//!     }
//! }
//!
//! impl Construct<(Arc<Window>,), u32> for Engine {
//!     fn construct((window,): (Arc<Window>,), fps: u32) -> Self {
//!         Engine { window, fps }
//!     }
//! }
//!
//! service! {
//!     pub WindowService => LocalDescriptor<Window, Singleton>;
//!     pub EngineService => LocalDescriptor<Engine, Scoped, (WindowService,)>;
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add::<WindowService>(LocalDescriptor::with_args("main"));
//! services.add::<EngineService>(LocalDescriptor::with_args(60u32));
//!
//! let mut provider = services.build().expect("valid registrations");
//! let engine = provider.get::<EngineService>().expect("registered");
//! assert_eq!((engine.window.title.as_str(), engine.fps), ("main", 60));
//! ```

use std::any::{TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::Result;
use crate::key::IdentityKey;
use crate::lifetime::{Lifetime, LifetimeKind};
use crate::scope::ServiceScope;
use crate::value::ValueBox;

/// A caller-supplied build function.
///
/// `Arc` so descriptors stay cheap to clone and can be shared between the
/// threads that resolve from scopes of the same provider.
pub type BuildFn<V> = Arc<dyn Fn(&mut ServiceScope) -> Result<V> + Send + Sync>;

/// A recipe that builds one service value from a scope.
pub trait ServiceDescriptor: Send + Sync + 'static {
    /// What the recipe produces.
    type Value: Send + Sync + 'static;

    /// How long the produced value lives.
    type Lifetime: LifetimeKind;

    /// Services resolved, in order, before the value is built.
    type Dependencies: DependencyList;

    /// Builds a new value, resolving dependencies from `scope`.
    ///
    /// # Errors
    /// Whatever resolving a dependency or the build function itself reports.
    /// A missing dependency surfaces as [`KhazinError::ServiceNotFound`].
    ///
    /// [`KhazinError::ServiceNotFound`]: crate::error::KhazinError::ServiceNotFound
    fn load(&self, scope: &mut ServiceScope) -> Result<Self::Value>;
}

/// Declares a requestable service: a descriptor type plus an optional key.
pub trait Injected: 'static {
    type Descriptor: ServiceDescriptor;

    /// Explicit key telling apart registrations of the same value type.
    const KEY: Option<&'static str> = None;

    /// The identity this declaration is registered and resolved under.
    fn identity() -> IdentityKey {
        IdentityKey::keyed::<ValueOf<Self>>(Self::KEY)
    }
}

/// Value type produced by a declared service.
pub type ValueOf<S> = <<S as Injected>::Descriptor as ServiceDescriptor>::Value;

/// Lifetime marker of a declared service.
pub type LifetimeOf<S> = <<S as Injected>::Descriptor as ServiceDescriptor>::Lifetime;

/// What resolving a declared service returns: the value itself for
/// transients, an `Arc` aliasing the stored instance otherwise.
pub type Handle<S> = <LifetimeOf<S> as LifetimeKind>::Handle<ValueOf<S>>;

/// Builds a value from resolved dependencies and extra arguments.
///
/// `Deps` is the tuple of dependency handles, in the order the descriptor
/// declares them; `Args` are the constructor arguments captured by the
/// descriptor, applied after the dependencies.
pub trait Construct<Deps, Args = ()>: Sized {
    fn construct(deps: Deps, args: Args) -> Self;
}

/// One declared dependency: the identity it resolves and the descriptor type
/// the declaration expects to find registered there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub key: IdentityKey,
    pub descriptor_type: TypeId,
    pub descriptor_name: &'static str,
}

impl Dependency {
    pub fn of<S: Injected>() -> Self {
        Self {
            key: S::identity(),
            descriptor_type: TypeId::of::<S::Descriptor>(),
            descriptor_name: type_name::<S::Descriptor>(),
        }
    }
}

/// An ordered list of service declarations, resolved left to right.
///
/// Implemented for `()` and for tuples of up to eight [`Injected`] types.
pub trait DependencyList: 'static {
    /// The tuple of resolved handles.
    type Output;

    /// The declared dependencies, in order.
    fn dependencies() -> Vec<Dependency>;

    /// Identities of the declared dependencies, in order.
    fn keys() -> Vec<IdentityKey> {
        Self::dependencies().into_iter().map(|d| d.key).collect()
    }

    fn resolve(scope: &mut ServiceScope) -> Result<Self::Output>;
}

impl DependencyList for () {
    type Output = ();

    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    fn resolve(_scope: &mut ServiceScope) -> Result<()> {
        Ok(())
    }
}

macro_rules! dependency_tuple {
    ($($dep:ident),+) => {
        impl<$($dep: Injected),+> DependencyList for ($($dep,)+) {
            type Output = ($(Handle<$dep>,)+);

            fn dependencies() -> Vec<Dependency> {
                vec![$(Dependency::of::<$dep>()),+]
            }

            fn resolve(scope: &mut ServiceScope) -> Result<Self::Output> {
                Ok(($(scope.get::<$dep>()?,)+))
            }
        }
    };
}

dependency_tuple!(A);
dependency_tuple!(A, B);
dependency_tuple!(A, B, C);
dependency_tuple!(A, B, C, D);
dependency_tuple!(A, B, C, D, E);
dependency_tuple!(A, B, C, D, E, F);
dependency_tuple!(A, B, C, D, E, F, G);
dependency_tuple!(A, B, C, D, E, F, G, H);

/// Object-safe view of a descriptor, as stored in the registry.
pub(crate) trait ErasedDescriptor: Send + Sync {
    fn load_boxed(&self, scope: &mut ServiceScope) -> Result<ValueBox>;
    fn lifetime(&self) -> Lifetime;
    fn dependencies(&self) -> Vec<Dependency>;
    fn descriptor_type(&self) -> TypeId;
    fn descriptor_name(&self) -> &'static str;
    fn value_name(&self) -> &'static str;
}

impl<D: ServiceDescriptor> ErasedDescriptor for D {
    fn load_boxed(&self, scope: &mut ServiceScope) -> Result<ValueBox> {
        self.load(scope).map(ValueBox::new)
    }

    fn lifetime(&self) -> Lifetime {
        <D::Lifetime as LifetimeKind>::LIFETIME
    }

    fn dependencies(&self) -> Vec<Dependency> {
        D::Dependencies::dependencies()
    }

    fn descriptor_type(&self) -> TypeId {
        TypeId::of::<D>()
    }

    fn descriptor_name(&self) -> &'static str {
        type_name::<D>()
    }

    fn value_name(&self) -> &'static str {
        type_name::<D::Value>()
    }
}

// ═══════════════════════════════════════════
// FunctorDescriptor
// ═══════════════════════════════════════════

/// Builds any value type `V` with a caller-supplied function.
///
/// Used for services with external or custom construction, and for adapting
/// one service's output into another service.
pub struct FunctorDescriptor<V, L, D = ()> {
    build: BuildFn<V>,
    _marker: PhantomData<fn() -> (L, D)>,
}

impl<V, L, D> FunctorDescriptor<V, L, D>
where
    V: Send + Sync + 'static,
    L: LifetimeKind,
    D: DependencyList,
{
    /// Wraps a build function that receives the resolving scope.
    ///
    /// The function is expected to resolve what `D` declares; nothing checks
    /// that it does.
    pub fn new(build: impl Fn(&mut ServiceScope) -> Result<V> + Send + Sync + 'static) -> Self {
        Self {
            build: Arc::new(build),
            _marker: PhantomData,
        }
    }

    /// Wraps a build function that receives the resolved dependencies.
    pub fn from_dependencies(build: impl Fn(D::Output) -> Result<V> + Send + Sync + 'static) -> Self {
        Self::new(move |scope| build(D::resolve(scope)?))
    }
}

impl<V, L, D> Clone for FunctorDescriptor<V, L, D> {
    fn clone(&self) -> Self {
        Self {
            build: Arc::clone(&self.build),
            _marker: PhantomData,
        }
    }
}

impl<V, L, D> ServiceDescriptor for FunctorDescriptor<V, L, D>
where
    V: Send + Sync + 'static,
    L: LifetimeKind,
    D: DependencyList,
{
    type Value = V;
    type Lifetime = L;
    type Dependencies = D;

    fn load(&self, scope: &mut ServiceScope) -> Result<V> {
        (self.build)(scope)
    }
}

impl<V, L, D> Injected for FunctorDescriptor<V, L, D>
where
    V: Send + Sync + 'static,
    L: LifetimeKind,
    D: DependencyList,
{
    type Descriptor = Self;
}

impl<V, L: LifetimeKind, D: DependencyList> fmt::Debug for FunctorDescriptor<V, L, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctorDescriptor")
            .field("value", &type_name::<V>())
            .field("lifetime", &L::LIFETIME)
            .field("dependencies", &D::keys())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Storage descriptors
// ═══════════════════════════════════════════

/// Builds a `Box<T>`: the value has a single owner.
pub struct ExclusiveDescriptor<T: ?Sized, L, D = ()> {
    inner: FunctorDescriptor<Box<T>, L, D>,
}

/// Builds an `Arc<T>`: the value may have several holders. `T` may be a
/// trait object.
pub struct SharedDescriptor<T: ?Sized, L, D = ()> {
    inner: FunctorDescriptor<Arc<T>, L, D>,
}

/// Builds a `T` held by value, embedded directly in the store slot.
pub struct LocalDescriptor<T, L, D = ()> {
    inner: FunctorDescriptor<T, L, D>,
}

impl<T, L, D> ExclusiveDescriptor<T, L, D>
where
    T: ?Sized + Send + Sync + 'static,
    L: LifetimeKind,
    D: DependencyList,
{
    pub fn from_fn(build: impl Fn(&mut ServiceScope) -> Result<Box<T>> + Send + Sync + 'static) -> Self {
        Self { inner: FunctorDescriptor::new(build) }
    }
}

impl<T, L, D> ExclusiveDescriptor<T, L, D>
where
    T: Send + Sync + 'static,
    L: LifetimeKind,
    D: DependencyList,
{
    /// Constructs `T` in place from the dependencies followed by `args`.
    pub fn with_args<A>(args: A) -> Self
    where
        T: Construct<D::Output, A>,
        A: Clone + Send + Sync + 'static,
    {
        Self::from_fn(move |scope| {
            let deps = D::resolve(scope)?;
            Ok(Box::new(T::construct(deps, args.clone())))
        })
    }

    pub fn new() -> Self
    where
        T: Construct<D::Output>,
    {
        Self::with_args(())
    }
}

impl<T, L, D> SharedDescriptor<T, L, D>
where
    T: ?Sized + Send + Sync + 'static,
    L: LifetimeKind,
    D: DependencyList,
{
    pub fn from_fn(build: impl Fn(&mut ServiceScope) -> Result<Arc<T>> + Send + Sync + 'static) -> Self {
        Self { inner: FunctorDescriptor::new(build) }
    }
}

impl<T, L, D> SharedDescriptor<T, L, D>
where
    T: Send + Sync + 'static,
    L: LifetimeKind,
    D: DependencyList,
{
    /// Constructs `T` in place from the dependencies followed by `args`.
    pub fn with_args<A>(args: A) -> Self
    where
        T: Construct<D::Output, A>,
        A: Clone + Send + Sync + 'static,
    {
        Self::from_fn(move |scope| {
            let deps = D::resolve(scope)?;
            Ok(Arc::new(T::construct(deps, args.clone())))
        })
    }

    pub fn new() -> Self
    where
        T: Construct<D::Output>,
    {
        Self::with_args(())
    }
}

impl<T, L, D> LocalDescriptor<T, L, D>
where
    T: Send + Sync + 'static,
    L: LifetimeKind,
    D: DependencyList,
{
    pub fn from_fn(build: impl Fn(&mut ServiceScope) -> Result<T> + Send + Sync + 'static) -> Self {
        Self { inner: FunctorDescriptor::new(build) }
    }

    /// Constructs `T` in place from the dependencies followed by `args`.
    pub fn with_args<A>(args: A) -> Self
    where
        T: Construct<D::Output, A>,
        A: Clone + Send + Sync + 'static,
    {
        Self::from_fn(move |scope| {
            let deps = D::resolve(scope)?;
            Ok(T::construct(deps, args.clone()))
        })
    }

    pub fn new() -> Self
    where
        T: Construct<D::Output>,
    {
        Self::with_args(())
    }
}

/// Trait plumbing shared by the storage descriptors: they all delegate to
/// their inner functor.
macro_rules! storage_descriptor {
    ($name:ident, $value:ty, [$($unsized:tt)*]) => {
        impl<T, L, D> ServiceDescriptor for $name<T, L, D>
        where
            T: $($unsized)* Send + Sync + 'static,
            L: LifetimeKind,
            D: DependencyList,
        {
            type Value = $value;
            type Lifetime = L;
            type Dependencies = D;

            fn load(&self, scope: &mut ServiceScope) -> Result<$value> {
                self.inner.load(scope)
            }
        }

        impl<T, L, D> Injected for $name<T, L, D>
        where
            T: $($unsized)* Send + Sync + 'static,
            L: LifetimeKind,
            D: DependencyList,
        {
            type Descriptor = Self;
        }

        impl<T, L, D> Default for $name<T, L, D>
        where
            T: Construct<D::Output> + Send + Sync + 'static,
            L: LifetimeKind,
            D: DependencyList,
        {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<T: $($unsized)*, L, D> Clone for $name<T, L, D> {
            fn clone(&self) -> Self {
                Self { inner: self.inner.clone() }
            }
        }

        impl<T: $($unsized)*, L: LifetimeKind, D: DependencyList> fmt::Debug for $name<T, L, D> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("value", &type_name::<$value>())
                    .field("lifetime", &L::LIFETIME)
                    .field("dependencies", &D::keys())
                    .finish()
            }
        }
    };
}

storage_descriptor!(ExclusiveDescriptor, Box<T>, [?Sized +]);
storage_descriptor!(SharedDescriptor, Arc<T>, [?Sized +]);
storage_descriptor!(LocalDescriptor, T, []);

/// Declares marker types implementing [`Injected`].
///
/// ```rust
/// use khazin_container::prelude::*;
///
/// # pub struct Window;
/// # pub struct Engine;
/// # pub struct Frame;
/// khazin_container::service! {
///     /// The application window.
///     pub WindowService => LocalDescriptor<Window, Singleton>;
///     pub EngineService => SharedDescriptor<Engine, Scoped, (WindowService,)>;
///     pub HudFrame => LocalDescriptor<Frame, Transient>, key = "hud";
/// }
///
/// assert_eq!(WindowService::identity(), IdentityKey::of::<Window>());
/// assert_eq!(HudFrame::identity(), IdentityKey::named::<Frame>("hud"));
/// ```
#[macro_export]
macro_rules! service {
    ($($(#[$meta:meta])* $vis:vis $name:ident => $descriptor:ty $(, key = $key:literal)? ;)+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, Default)]
            $vis struct $name;

            impl $crate::descriptor::Injected for $name {
                type Descriptor = $descriptor;
                $(const KEY: Option<&'static str> = Some($key);)?
            }
        )+
    };
}
