//! Wires a window, an engine per session and a set of frame listeners.
//!
//! Run with `RUST_LOG=khazin_container=trace` to watch every resolution step.

use std::sync::Arc;

use khazin::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct Window {
    title: String,
}

impl Construct<(), &'static str> for Window {
    fn construct((): (), title: &'static str) -> Self {
        Window { title: title.into() }
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        info!(title = %self.title, "Window closed");
    }
}

struct Engine {
    window: Arc<Window>,
    fps: u32,
}

impl Construct<(Arc<Window>,), u32> for Engine {
    fn construct((window,): (Arc<Window>,), fps: u32) -> Self {
        Engine { window, fps }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        info!(fps = self.fps, "Engine stopped");
    }
}

trait FrameListener: Send + Sync {
    fn on_frame(&self, frame: u64);
}

struct HudOverlay;

impl FrameListener for HudOverlay {
    fn on_frame(&self, frame: u64) {
        info!(frame, "HUD redrawn");
    }
}

struct Profiler;

impl FrameListener for Profiler {
    fn on_frame(&self, frame: u64) {
        info!(frame, "Frame timed");
    }
}

khazin::service! {
    WindowService => LocalDescriptor<Window, Singleton>;
    EngineService => LocalDescriptor<Engine, Scoped, (WindowService,)>;
    ListenerService => SharedDescriptor<dyn FrameListener, Singleton>;
}

struct GraphicsModule;

impl ServiceModule for GraphicsModule {
    fn register(&self, services: &mut ServiceCollection) {
        services
            .add::<WindowService>(LocalDescriptor::with_args("khazin demo"))
            .add::<EngineService>(LocalDescriptor::with_args(60u32));
    }
}

struct ListenersModule;

impl ServiceModule for ListenersModule {
    fn register(&self, services: &mut ServiceCollection) {
        services
            .add::<ListenerService>(SharedDescriptor::from_fn(|_| {
                Ok(Arc::new(HudOverlay) as Arc<dyn FrameListener>)
            }))
            .add::<ListenerService>(SharedDescriptor::from_fn(|_| {
                Ok(Arc::new(Profiler) as Arc<dyn FrameListener>)
            }));
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,khazin=debug")),
        )
        .init();

    let mut services = ServiceCollection::new();
    services.add_module(&GraphicsModule).add_module(&ListenersModule);
    info!("Registrations:\n{}", services.describe());

    let mut provider = services.build()?;

    for session in 1..=2 {
        let mut scope = provider.create_scope();
        let engine = scope.get::<EngineService>()?;
        info!(session, title = %engine.window.title, fps = engine.fps, "Session started");
    }

    let mut frame = 0;
    provider.for_each::<ListenerService>(|listener| {
        frame += 1;
        listener.on_frame(frame);
    })?;

    info!(singletons = provider.singleton_count(), "Shutting down");
    Ok(())
}
