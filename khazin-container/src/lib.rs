//! Core container implementation for Khazin DI.

pub mod collection;
pub mod descriptor;
pub mod error;
mod graph;
pub mod key;
pub mod lifetime;
pub mod module;
pub mod provider;
pub mod scope;
mod store;
pub mod value;

pub use collection::{RegistrationPolicy, ServiceCollection};
pub use error::{KhazinError, Result};
pub use key::IdentityKey;
pub use provider::{ProviderOptions, ServiceProvider, prelude};
pub use scope::ServiceScope;
