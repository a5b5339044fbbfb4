//! Error types for registration, validation and resolution.
//!
//! Every error names the services involved by type and key, and most carry a
//! hint on how to fix the wiring.

use std::fmt;

use khazin_support::rendering::{render_chain, shorten_type_name};

use crate::key::IdentityKey;
use crate::lifetime::Lifetime;
pub use crate::value::TypeMismatchError;

/// Main error type for all container operations.
#[derive(Debug, thiserror::Error)]
pub enum KhazinError {
    /// The requested identity has no registration.
    #[error("{}", .0)]
    ServiceNotFound(ServiceNotFoundError),

    /// The identity is registered, but with a different descriptor type
    /// than the one requested.
    #[error("{}", .0)]
    DescriptorMismatch(DescriptorMismatchError),

    /// A type-erased value was extracted as the wrong type.
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatchError),

    /// A service depends on itself, directly or through other services.
    #[error("{}", .0)]
    CyclicDependency(CyclicDependencyError),

    /// A longer-lived service depends on a shorter-lived one.
    /// Only reported when strict lifetime checking is enabled.
    #[error("{}", .0)]
    LifetimeMismatch(LifetimeMismatchError),

    /// A caller-supplied build function failed.
    #[error("Failed to construct {key}: {source}")]
    ConstructionFailed {
        key: IdentityKey,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl KhazinError {
    /// Wraps an error raised inside a build function.
    pub fn construction_failed(
        key: IdentityKey,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        KhazinError::ConstructionFailed {
            key,
            source: source.into(),
        }
    }

    /// Returns `true` for the "service not found" family: no registration at
    /// all, or a registration of a different descriptor shape.
    pub fn is_service_not_found(&self) -> bool {
        matches!(
            self,
            KhazinError::ServiceNotFound(_) | KhazinError::DescriptorMismatch(_)
        )
    }
}

/// A requested service has no registration.
#[derive(Debug)]
pub struct ServiceNotFoundError {
    /// The identity that was requested
    pub requested: IdentityKey,
    /// The service whose dependency list asked for it, if any
    pub required_by: Option<IdentityKey>,
    /// Registered identities with a similar type name
    pub suggestions: Vec<IdentityKey>,
}

impl fmt::Display for ServiceNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service not found: {}", self.requested)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: Did you forget to add a descriptor producing {}?",
            shorten_type_name(self.requested.type_name())
        )
    }
}

/// The registered descriptor is not the one the caller asked for.
#[derive(Debug)]
pub struct DescriptorMismatchError {
    pub key: IdentityKey,
    /// Descriptor type named by the request
    pub requested: &'static str,
    /// Descriptor type actually registered
    pub registered: &'static str,
    /// The service whose dependency list asked for it, if any
    pub required_by: Option<IdentityKey>,
}

impl fmt::Display for DescriptorMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service not found: {} is not registered as {}", self.key, shorten_type_name(self.requested))?;
        write!(f, "\n  Registered as: {}", shorten_type_name(self.registered))?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        write!(
            f,
            "\n  Hint: Request the service through the same declaration it was added with"
        )
    }
}

/// Resolution re-entered a service that was still being built.
#[derive(Debug)]
pub struct CyclicDependencyError {
    /// The chain of services forming the cycle, first and last are the same.
    pub chain: Vec<IdentityKey>,
}

impl fmt::Display for CyclicDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cyclic dependency detected:\n  ")?;

        let names: Vec<String> = self
            .chain
            .iter()
            .map(|k| shorten_type_name(k.type_name()))
            .collect();
        write!(f, "{}", render_chain(&names))?;

        write!(
            f,
            "\n  Hint: Break the cycle with a build function that resolves one side later"
        )
    }
}

/// A dependency lives shorter than its consumer.
#[derive(Debug)]
pub struct LifetimeMismatchError {
    pub dependency: IdentityKey,
    pub dependency_lifetime: Lifetime,
    pub consumer: IdentityKey,
    pub consumer_lifetime: Lifetime,
}

impl fmt::Display for LifetimeMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lifetime mismatch: {} ({}) depends on {} ({})",
            self.consumer, self.consumer_lifetime, self.dependency, self.dependency_lifetime,
        )?;
        write!(
            f,
            "\n  A {} service would keep a {} instance alive past its owner",
            self.consumer_lifetime, self.dependency_lifetime,
        )?;
        write!(
            f,
            "\n  Hint: Make {} {} or longer, or disable strict lifetimes",
            self.dependency, self.consumer_lifetime,
        )
    }
}

/// Convenient Result type for container operations.
pub type Result<T> = std::result::Result<T, KhazinError>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Window;
    struct Engine;

    #[test]
    fn service_not_found_display() {
        let err = KhazinError::ServiceNotFound(ServiceNotFoundError {
            requested: IdentityKey::of::<Window>(),
            required_by: Some(IdentityKey::of::<Engine>()),
            suggestions: vec![],
        });

        let msg = err.to_string();
        assert!(msg.contains("Service not found"));
        assert!(msg.contains("Window"));
        assert!(msg.contains("Required by"));
        assert!(err.is_service_not_found());
    }

    #[test]
    fn descriptor_mismatch_is_not_found_family() {
        let err = KhazinError::DescriptorMismatch(DescriptorMismatchError {
            key: IdentityKey::of::<Window>(),
            requested: "khazin::FunctorDescriptor<Window>",
            registered: "khazin::LocalDescriptor<Window>",
            required_by: Some(IdentityKey::of::<Engine>()),
        });

        let msg = err.to_string();
        assert!(err.is_service_not_found());
        assert!(msg.contains("Registered as: LocalDescriptor<Window>"));
        assert!(msg.contains("Required by"));
    }

    #[test]
    fn cyclic_dependency_display() {
        let err = KhazinError::CyclicDependency(CyclicDependencyError {
            chain: vec![
                IdentityKey::of::<Window>(),
                IdentityKey::of::<Engine>(),
                IdentityKey::of::<Window>(),
            ],
        });

        let msg = err.to_string();
        assert!(msg.contains("Cyclic"));
        assert!(msg.contains("Window → Engine → Window"));
        assert!(!err.is_service_not_found());
    }

    #[test]
    fn lifetime_mismatch_display() {
        let err = KhazinError::LifetimeMismatch(LifetimeMismatchError {
            dependency: IdentityKey::of::<Window>(),
            dependency_lifetime: Lifetime::Scoped,
            consumer: IdentityKey::of::<Engine>(),
            consumer_lifetime: Lifetime::Singleton,
        });

        let msg = err.to_string();
        assert!(msg.contains("Lifetime mismatch"));
        assert!(msg.contains("Singleton"));
        assert!(msg.contains("Scoped"));
    }

    #[test]
    fn construction_failed_keeps_source() {
        let err = KhazinError::construction_failed(IdentityKey::of::<Window>(), "display unavailable");
        assert!(err.to_string().contains("display unavailable"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
