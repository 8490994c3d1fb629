//! Shader side of emberfx: effects, their pooled GPU instances, and the
//! per-window animation driver.
//!
//! ```text
//!   EffectCatalog ──acquire──▶ ShaderInstance ──▶ AnimationDriver::begin
//!        ▲  │                                          │ tick() per frame
//!        │  └─ ProgramRegistry (one program / effect)  ▼
//!        └────────────── release ◀────────────── FinishedActivation
//! ```
//!
//! All GPU access goes through the [`ShaderBackend`] trait. [`WgpuBackend`]
//! wraps GLSL effect bodies into Vulkan GLSL and draws them with `wgpu`;
//! [`RecordingBackend`] records calls for tests and headless tooling.

mod animation;
mod backend;
mod catalog;
mod compile;
mod effect;
pub mod effects;
mod gpu;
mod pool;
mod registry;
mod runtime;
mod shader;
mod timeline;

pub use animation::{
    Activation, AnimationDriver, AnimationEvent, DriverState, FinishedActivation, UnredirectGuard,
    UnredirectLock, TEST_MODE_PROGRESS,
};
pub use backend::{
    BackendCall, InstanceHandle, ProgramHandle, RecordingBackend, ShaderBackend, TextureHandle,
    UniformLocation, UniformValue,
};
pub use catalog::EffectCatalog;
pub use compile::{declared_uniforms, wrap_effect_fragment, DeclaredUniform, UniformLayout, UniformType};
pub use effect::{
    animation_time_key, enable_key, format_color, parse_color, setting_key, write_tunables,
    ActivationParams, Effect, HostVersion, InstanceSetup, SeedSource, Tunable, TunableDefault,
    UniformWriter,
};
pub use gpu::WgpuBackend;
pub use pool::{PoolStats, Pooled, ShaderPool};
pub use registry::{CompiledProgram, ProgramRegistry, UniformLocations};
pub use runtime::{
    manual_time_sources, system_time_sources, BoxedTimeSource, ManualClock,
    ManualTimeSource, SystemTimeSource, TimeSample, TimeSource, TimeSourceFactory,
};
pub use shader::{ShaderInstance, U_DURATION, U_FOR_OPENING, U_PADDING, U_PROGRESS, U_SEED, U_SIZE};
pub use timeline::Timeline;

use profiles::SettingsError;

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("failed to compile shader '{label}': {message}")]
    Compile { label: String, message: String },
    #[error("GPU backend error: {0}")]
    Device(String),
    #[error("texture error: {0}")]
    Texture(String),
    #[error("unknown effect '{0}'")]
    UnknownEffect(String),
    #[error("effect '{0}' is already registered")]
    DuplicateEffect(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
