//! Service identity keys.
//!
//! [`IdentityKey`] names a registrable service slot: the [`TypeId`] of the
//! value a descriptor produces, plus an optional explicit key used to tell
//! apart several registrations of the same value type.
//!
//! [`SlotKey`] points at one registration inside an identity's bucket and is
//! what the instance stores are indexed by.

use std::any::{TypeId, type_name};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies a service in the registry and in every instance store.
///
/// Equality, hashing and ordering only look at the type identity and the
/// optional key. The type name is kept around for error messages.
///
/// # Examples
/// ```
/// use khazin_container::key::IdentityKey;
///
/// let key = IdentityKey::of::<String>();
/// assert_eq!(key.type_name(), "alloc::string::String");
/// assert_eq!(key.name(), None);
///
/// let primary = IdentityKey::named::<String>("primary");
/// let replica = IdentityKey::named::<String>("replica");
/// assert_ne!(primary, replica);
/// assert_ne!(primary, key);
/// ```
#[derive(Clone, Copy)]
pub struct IdentityKey {
    type_id: TypeId,
    type_name: &'static str,
    name: Option<&'static str>,
}

impl IdentityKey {
    /// Creates the unkeyed identity for values of type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::keyed::<T>(None)
    }

    /// Creates a keyed identity for values of type `T`.
    #[inline]
    pub fn named<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self::keyed::<T>(Some(name))
    }

    /// Creates an identity for `T` with an optional key.
    #[inline]
    pub fn keyed<T: ?Sized + 'static>(name: Option<&'static str>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            name,
        }
    }

    /// Creates an identity from its raw parts.
    ///
    /// Prefer [`IdentityKey::of`]; this exists for code that only holds a
    /// [`TypeId`], such as range queries over every key of one type.
    #[inline]
    pub fn from_raw(type_id: TypeId, type_name: &'static str, name: Option<&'static str>) -> Self {
        Self { type_id, type_name, name }
    }

    /// Returns the [`TypeId`] of the service value.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the human-readable value type name.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the explicit key, `None` for the unkeyed registration.
    #[inline]
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    /// Lowest possible identity for `type_id`; every key of that type sorts
    /// at or after it.
    pub(crate) fn first_of(type_id: TypeId) -> Self {
        Self::from_raw(type_id, "", None)
    }
}

impl PartialEq for IdentityKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for IdentityKey {}

impl Hash for IdentityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

impl PartialOrd for IdentityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IdentityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_id
            .cmp(&other.type_id)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "IdentityKey({}, key={:?})", self.type_name, name),
            None => write!(f, "IdentityKey({})", self.type_name),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "{} (key={:?})", self.type_name, name),
            None => write!(f, "{}", self.type_name),
        }
    }
}

/// One registration of an identity: its position in the identity's bucket.
///
/// `index` 0 is the registration `get` resolves; higher indices are only
/// reached through `for_each`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub identity: IdentityKey,
    pub index: usize,
}

impl SlotKey {
    #[inline]
    pub fn new(identity: IdentityKey, index: usize) -> Self {
        Self { identity, index }
    }

    /// The slot `get` resolves for `identity`.
    #[inline]
    pub fn primary(identity: IdentityKey) -> Self {
        Self::new(identity, 0)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index == 0 {
            write!(f, "{}", self.identity)
        } else {
            write!(f, "{} #{}", self.identity, self.index)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct Window;

    #[test]
    fn key_of_type() {
        let key = IdentityKey::of::<Window>();
        assert!(key.type_name().contains("Window"));
        assert_eq!(key.name(), None);
    }

    #[test]
    fn same_type_same_key() {
        assert_eq!(IdentityKey::of::<String>(), IdentityKey::of::<String>());
    }

    #[test]
    fn different_types_differ() {
        assert_ne!(IdentityKey::of::<String>(), IdentityKey::of::<i32>());
    }

    #[test]
    fn keyed_identities_differ() {
        assert_ne!(IdentityKey::named::<String>("a"), IdentityKey::named::<String>("b"));
        assert_ne!(IdentityKey::named::<String>("a"), IdentityKey::of::<String>());
    }

    #[test]
    fn type_name_is_not_part_of_identity() {
        let raw = IdentityKey::from_raw(TypeId::of::<String>(), "whatever", None);
        assert_eq!(raw, IdentityKey::of::<String>());
    }

    #[test]
    fn unkeyed_sorts_before_keyed() {
        let mut map = BTreeMap::new();
        map.insert(IdentityKey::named::<String>("b"), 2);
        map.insert(IdentityKey::named::<String>("a"), 1);
        map.insert(IdentityKey::of::<String>(), 0);

        let order: Vec<_> = map.values().copied().collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(IdentityKey::first_of(TypeId::of::<String>()), IdentityKey::of::<String>());
    }

    #[test]
    fn slot_display() {
        let identity = IdentityKey::of::<u8>();
        assert_eq!(SlotKey::primary(identity).to_string(), "u8");
        assert_eq!(SlotKey::new(identity, 2).to_string(), "u8 #2");
    }

    #[test]
    fn unsized_type_key() {
        trait Renderer {}
        let _key = IdentityKey::of::<dyn Renderer>();
    }
}
