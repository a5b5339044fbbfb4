//! Service lifetimes.
//!
//! A lifetime decides where a resolved service lives:
//! - [`Lifetime::Singleton`]: one instance per provider
//! - [`Lifetime::Scoped`]: one instance per scope
//! - [`Lifetime::Transient`]: a new value on every resolve, owned by the caller
//!
//! Descriptors carry their lifetime at the type level through the marker
//! types [`Singleton`], [`Scoped`] and [`Transient`], which also decide the
//! handle type `get` returns.
//!
//! # Ordering
//! `Singleton > Scoped > Transient`: a singleton outlives any scope, a scope
//! outlives a transient value.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::value::{Instance, ValueBox};

/// Runtime view of a descriptor's lifetime.
///
/// # Examples
/// ```
/// use khazin_container::lifetime::Lifetime;
///
/// assert!(Lifetime::Singleton > Lifetime::Scoped);
/// assert!(Lifetime::Scoped > Lifetime::Transient);
/// assert!(!Lifetime::Transient.is_cached());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Built fresh on every resolve and handed over to the caller.
    Transient,

    /// Built once per scope, released when the scope is dropped.
    Scoped,

    /// Built once per provider and shared by every scope derived from it.
    Singleton,
}

impl Lifetime {
    /// Returns `true` if resolved instances are kept in a store.
    #[inline]
    pub fn is_cached(&self) -> bool {
        matches!(self, Lifetime::Singleton | Lifetime::Scoped)
    }

    #[inline]
    fn rank(&self) -> u8 {
        match self {
            Lifetime::Singleton => 2,
            Lifetime::Scoped => 1,
            Lifetime::Transient => 0,
        }
    }
}

impl PartialOrd for Lifetime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Lifetime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => write!(f, "Singleton"),
            Lifetime::Scoped => write!(f, "Scoped"),
            Lifetime::Transient => write!(f, "Transient"),
        }
    }
}

/// Outcome of resolving one registration, before it is typed.
#[derive(Debug)]
pub enum Resolved {
    /// A transient value the caller now owns.
    Fresh(ValueBox),
    /// A stored scoped or singleton instance.
    Cached(Instance),
}

impl Resolved {
    /// Takes ownership of a fresh value.
    pub fn into_owned<V: Send + Sync + 'static>(self) -> Result<V> {
        match self {
            Resolved::Fresh(value) => Ok(value.take::<V>()?),
            Resolved::Cached(instance) => Err(crate::value::TypeMismatchError {
                expected: std::any::type_name::<V>(),
                found: instance.type_name(),
            }
            .into()),
        }
    }

    /// Returns a handle aliasing the stored value.
    pub fn into_shared<V: Send + Sync + 'static>(self) -> Result<Arc<V>> {
        let instance = match self {
            Resolved::Fresh(value) => value.into_instance(),
            Resolved::Cached(instance) => instance,
        };
        Ok(instance.downcast::<V>()?)
    }
}

/// Type-level lifetime carried by a descriptor.
pub trait LifetimeKind: Send + Sync + 'static {
    const LIFETIME: Lifetime;

    /// What `get` hands back for a value of type `V`.
    type Handle<V: Send + Sync + 'static>;

    fn handle<V: Send + Sync + 'static>(resolved: Resolved) -> Result<Self::Handle<V>>;
}

/// Marker for [`Lifetime::Transient`]; handles are the values themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transient;

/// Marker for [`Lifetime::Scoped`]; handles are `Arc<V>` into the scope's store.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scoped;

/// Marker for [`Lifetime::Singleton`]; handles are `Arc<V>` into the provider's store.
#[derive(Debug, Clone, Copy, Default)]
pub struct Singleton;

impl LifetimeKind for Transient {
    const LIFETIME: Lifetime = Lifetime::Transient;
    type Handle<V: Send + Sync + 'static> = V;

    fn handle<V: Send + Sync + 'static>(resolved: Resolved) -> Result<Self::Handle<V>> {
        resolved.into_owned()
    }
}

impl LifetimeKind for Scoped {
    const LIFETIME: Lifetime = Lifetime::Scoped;
    type Handle<V: Send + Sync + 'static> = Arc<V>;

    fn handle<V: Send + Sync + 'static>(resolved: Resolved) -> Result<Self::Handle<V>> {
        resolved.into_shared()
    }
}

impl LifetimeKind for Singleton {
    const LIFETIME: Lifetime = Lifetime::Singleton;
    type Handle<V: Send + Sync + 'static> = Arc<V>;

    fn handle<V: Send + Sync + 'static>(resolved: Resolved) -> Result<Self::Handle<V>> {
        resolved.into_shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KhazinError;

    #[test]
    fn lifetime_ordering() {
        assert!(Lifetime::Singleton > Lifetime::Scoped);
        assert!(Lifetime::Scoped > Lifetime::Transient);
        assert!(Lifetime::Singleton > Lifetime::Transient);
    }

    #[test]
    fn lifetime_is_cached() {
        assert!(Lifetime::Singleton.is_cached());
        assert!(Lifetime::Scoped.is_cached());
        assert!(!Lifetime::Transient.is_cached());
    }

    #[test]
    fn lifetime_display() {
        assert_eq!(Lifetime::Singleton.to_string(), "Singleton");
        assert_eq!(Lifetime::Scoped.to_string(), "Scoped");
        assert_eq!(Lifetime::Transient.to_string(), "Transient");
    }

    #[test]
    fn markers_map_to_runtime_lifetime() {
        assert_eq!(Transient::LIFETIME, Lifetime::Transient);
        assert_eq!(Scoped::LIFETIME, Lifetime::Scoped);
        assert_eq!(Singleton::LIFETIME, Lifetime::Singleton);
    }

    #[test]
    fn transient_handle_is_owned_value() {
        let value = Transient::handle::<String>(Resolved::Fresh(ValueBox::new(String::from("x")))).unwrap();
        assert_eq!(value, "x");
    }

    #[test]
    fn cached_handle_aliases_instance() {
        let instance = ValueBox::new(5u16).into_instance();
        let a = Singleton::handle::<u16>(Resolved::Cached(instance.clone())).unwrap();
        let b = Scoped::handle::<u16>(Resolved::Cached(instance)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn transient_handle_rejects_cached_instance() {
        let instance = ValueBox::new(5u16).into_instance();
        let err = Transient::handle::<u16>(Resolved::Cached(instance)).unwrap_err();
        assert!(matches!(err, KhazinError::TypeMismatch(_)));
    }
}
