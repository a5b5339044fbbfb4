//! Service modules: groups of related registrations.
//!
//! # Examples
//! ```rust
//! use khazin_container::prelude::*;
//!
//! # struct Window { title: String }
//! # impl Construct<(), &'static str> for Window {
//! #     fn construct((): (), title: &'static str) -> Self { Window { title: title.into() } }
//! # }
//! # struct Renderer;
//! # impl Construct<()> for Renderer {
//! #     fn construct((): (), (): ()) -> Self { Renderer }
//! # }
//! # struct Mixer;
//! # impl Construct<()> for Mixer {
//! #     fn construct((): (), (): ()) -> Self { Mixer }
//! # }
//! # khazin_container::service! {
//! #     WindowService => LocalDescriptor<Window, Singleton>;
//! #     RendererService => LocalDescriptor<Renderer, Singleton>;
//! #     MixerService => LocalDescriptor<Mixer, Singleton>;
//! # }
//! struct GraphicsModule;
//!
//! impl ServiceModule for GraphicsModule {
//!     fn register(&self, services: &mut ServiceCollection) {
//!         services.add::<WindowService>(LocalDescriptor::with_args("main"));
//!         services.add_default::<RendererService>();
//!     }
//! }
//!
//! struct AudioModule;
//!
//! impl ServiceModule for AudioModule {
//!     fn register(&self, services: &mut ServiceCollection) {
//!         services.add_default::<MixerService>();
//!     }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_module(&GraphicsModule).add_module(&AudioModule);
//! assert_eq!(services.len(), 3);
//! ```

use crate::collection::ServiceCollection;

/// A unit of registration, applied with [`ServiceCollection::add_module`].
///
/// Splitting registrations by subsystem keeps wiring next to the code it
/// wires, instead of one registration block for the whole application.
pub trait ServiceModule: Send + Sync {
    /// Registers this module's services.
    fn register(&self, services: &mut ServiceCollection);

    /// Human-readable name, used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
