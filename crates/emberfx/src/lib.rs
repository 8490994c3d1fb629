//! Shader-driven window open/close transitions for compositors.
//!
//! [`TransitionEngine`] sits between the host's native transition pipeline
//! (the [`TransitionHost`] seam) and the GPU (a [`ShaderBackend`]). For each
//! window event it picks a profile and effect, drives a pooled shader
//! instance through the animation, then hands control back to the host's
//! own finalizer.

mod config;
mod engine;
mod error;
mod host;
mod interceptor;

pub use config::{EngineConfig, CONFIG_VERSION};
pub use engine::{storage_from_config, TransitionEngine};
pub use error::EngineError;
pub use host::{HostEnvironment, TransitionHost, TransitionKind, WindowInfo};
pub use interceptor::{PendingTransition, TransitionInterceptor};

pub use profiles::{
    ColorScheme, MemoryStorage, PowerProfile, ProfileChange, ProfileDirectory, ProfileStorage,
    SettingValue, SettingsValues, WindowId, WindowKind,
};
pub use renderer::{
    AnimationEvent, Effect, EffectCatalog, HostVersion, PoolStats, RecordingBackend,
    ShaderBackend, WgpuBackend,
};
pub use selector::Selection;

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`) for
/// hosts that have none. Does nothing if a global subscriber already exists.
pub fn initialise_tracing() {
    let default_filter = "info,naga=error,wgpu=error,wgpu_core=error,wgpu_hal=error";
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
