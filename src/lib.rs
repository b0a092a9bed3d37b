//! Multi-pass render pipeline core: shadow maps, deferred lighting and bloom
//! compositing over a scene of models and lights.
//!
//! Passes are issued through [`renderer::gpu::GraphicsDevice`]. The wgpu
//! backend executes them; the recording backend captures the command stream.

pub mod renderer;
pub mod scene;
pub mod settings;

pub use renderer::{RenderOptions, Renderer};
pub use scene::Scene;
pub use settings::RenderSettings;

/// Installs `env_logger` at `Info` unless `RUST_LOG` says otherwise.
/// Calling it more than once is harmless.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}
