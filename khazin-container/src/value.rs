//! Type-erased service values.
//!
//! Descriptors are generic over the value they build, but the stores are not.
//! [`ValueBox`] carries a freshly built value out of a descriptor; once a
//! store takes it over it becomes an [`Instance`], which every consumer of a
//! scoped or singleton service aliases.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

/// Extraction asked for a type other than the one that was stored.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Type mismatch: expected {expected}, found {found}")]
pub struct TypeMismatchError {
    pub expected: &'static str,
    pub found: &'static str,
}

/// A single-owner box holding any constructed service value.
///
/// Move-only: there is no `Clone`, and [`take`](ValueBox::take) consumes it.
///
/// # Examples
/// ```
/// use khazin_container::value::ValueBox;
///
/// let boxed = ValueBox::new(42u32);
/// assert!(boxed.is::<u32>());
/// assert_eq!(boxed.take::<u32>().unwrap(), 42);
///
/// let boxed = ValueBox::new(String::from("window"));
/// assert!(boxed.take::<u32>().is_err());
/// ```
pub struct ValueBox {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ValueBox {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Returns `true` if the box holds a `T`.
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Name of the stored type.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Releases the stored value.
    ///
    /// # Errors
    /// [`TypeMismatchError`] if the box does not hold a `T`. The value is
    /// dropped in that case.
    pub fn take<T: 'static>(self) -> Result<T, TypeMismatchError> {
        let found = self.type_name;
        self.value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| TypeMismatchError {
                expected: type_name::<T>(),
                found,
            })
    }

    /// Moves the value into shared storage.
    pub fn into_instance(self) -> Instance {
        Instance {
            value: Arc::from(self.value),
            type_name: self.type_name,
        }
    }
}

impl fmt::Debug for ValueBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueBox")
            .field("type", &self.type_name)
            .finish()
    }
}

/// A stored service value.
///
/// Cloning an `Instance` aliases the same allocation, so every handle handed
/// out for a scoped or singleton service observes the same object.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Instance {
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns a typed handle to the stored value.
    ///
    /// # Errors
    /// [`TypeMismatchError`] if the stored value is not a `T`.
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, TypeMismatchError> {
        Arc::clone(&self.value)
            .downcast::<T>()
            .map_err(|_| TypeMismatchError {
                expected: type_name::<T>(),
                found: self.type_name,
            })
    }

    /// Returns `true` if both handles point at the same stored value.
    #[inline]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name)
            .field("handles", &Arc::strong_count(&self.value))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Window {
        title: String,
    }

    #[test]
    fn take_matching_type() {
        let boxed = ValueBox::new(Window { title: "main".into() });
        assert!(boxed.type_name().contains("Window"));
        let window = boxed.take::<Window>().unwrap();
        assert_eq!(window.title, "main");
    }

    #[test]
    fn take_wrong_type_reports_both_names() {
        let err = ValueBox::new(7u8).take::<String>().unwrap_err();
        assert_eq!(err.found, "u8");
        assert!(err.expected.contains("String"));
        assert!(err.to_string().contains("Type mismatch"));
    }

    #[test]
    fn boxed_pointers_are_distinct_types() {
        let boxed = ValueBox::new(Box::new(1i32));
        assert!(boxed.is::<Box<i32>>());
        assert!(!boxed.is::<i32>());
    }

    #[test]
    fn instance_handles_alias() {
        let instance = ValueBox::new(Window { title: "main".into() }).into_instance();
        let a = instance.downcast::<Window>().unwrap();
        let b = instance.clone().downcast::<Window>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(instance.ptr_eq(&instance.clone()));
    }

    #[test]
    fn instance_wrong_type() {
        let instance = ValueBox::new(3u64).into_instance();
        let err = instance.downcast::<u32>().unwrap_err();
        assert_eq!(err.expected, "u32");
        assert_eq!(err.found, "u64");
    }
}
