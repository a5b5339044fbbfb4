//! # Khazin: scoped dependency injection for Rust
//!
//! Services are declared as types, registered once in a
//! [`ServiceCollection`], checked when the [`ServiceProvider`] is built and
//! resolved with their dependencies from a provider or a scope.
//!
//! ```rust
//! use std::sync::Arc;
//! use khazin::prelude::*;
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
//! struct Engine {
//!     window: Arc<Window>,
//!     fps: u32,
//! }
//!
//! impl Construct<(Arc<Window>,), u32> for Engine {
//!     fn construct((window,): (Arc<Window>,), fps: u32) -> Self {
//!         Engine { window, fps }
//!     }
//! }
//!
//! khazin::service! {
//!     WindowService => LocalDescriptor<Window, Singleton>;
//!     EngineService => LocalDescriptor<Engine, Scoped, (WindowService,)>;
//! }
//!
//! let mut services = ServiceCollection::new();
//! services
//!     .add::<WindowService>(LocalDescriptor::with_args("main"))
//!     .add::<EngineService>(LocalDescriptor::with_args(60u32));
//!
//! let provider = services.build().expect("valid registrations");
//! let mut scope = provider.create_scope();
//! let engine = scope.get::<EngineService>().expect("registered");
//! assert_eq!(engine.window.title, "main");
//! assert_eq!(engine.fps, 60);
//! ```

pub use khazin_container::*;
pub use khazin_support::*;
