use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use profiles::{Direction, Schema, SettingValue, SettingsStore, WindowId};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::warn;

use crate::backend::{InstanceHandle, ShaderBackend, TextureHandle, UniformValue};
use crate::registry::UniformLocations;
use crate::ShaderError;

/// Host compositor version as `major.minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostVersion {
    pub major: u32,
    pub minor: u32,
}

impl HostVersion {
    /// Oldest host version any effect supports.
    pub const MINIMUM: HostVersion = HostVersion::new(3, 36);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for HostVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let major = parts
            .next()
            .and_then(|part| part.parse().ok())
            .ok_or_else(|| format!("invalid host version '{s}'"))?;
        let minor = match parts.next() {
            Some(part) => part
                .parse()
                .map_err(|_| format!("invalid host version '{s}'"))?,
            None => 0,
        };
        Ok(Self::new(major, minor))
    }
}

/// `<nick>-enable-effect`.
pub fn enable_key(nick: &str) -> String {
    format!("{nick}-enable-effect")
}

/// `<nick>-animation-time`.
pub fn animation_time_key(nick: &str) -> String {
    format!("{nick}-animation-time")
}

pub fn setting_key(nick: &str, param: &str) -> String {
    format!("{nick}-{param}")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TunableDefault {
    Double(f64),
    Int(i64),
    Bool(bool),
    /// Stored as a `#rrggbbaa` string, uploaded as a vec4.
    Color([f32; 4]),
}

/// A user-adjustable effect parameter bound to one shader uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tunable {
    pub param: &'static str,
    pub uniform: &'static str,
    pub default: TunableDefault,
}

impl Tunable {
    pub const fn double(param: &'static str, uniform: &'static str, default: f64) -> Self {
        Self {
            param,
            uniform,
            default: TunableDefault::Double(default),
        }
    }

    pub const fn int(param: &'static str, uniform: &'static str, default: i64) -> Self {
        Self {
            param,
            uniform,
            default: TunableDefault::Int(default),
        }
    }

    pub const fn boolean(param: &'static str, uniform: &'static str, default: bool) -> Self {
        Self {
            param,
            uniform,
            default: TunableDefault::Bool(default),
        }
    }

    pub const fn color(param: &'static str, uniform: &'static str, default: [f32; 4]) -> Self {
        Self {
            param,
            uniform,
            default: TunableDefault::Color(default),
        }
    }

    fn schema_default(&self) -> SettingValue {
        match self.default {
            TunableDefault::Double(v) => SettingValue::Double(v),
            TunableDefault::Int(v) => SettingValue::Int(v),
            TunableDefault::Bool(v) => SettingValue::Bool(v),
            TunableDefault::Color(rgba) => SettingValue::Str(format_color(rgba)),
        }
    }

    fn read(&self, nick: &str, settings: &dyn SettingsStore) -> Result<UniformValue, ShaderError> {
        let key = setting_key(nick, self.param);
        Ok(match self.default {
            TunableDefault::Double(_) => UniformValue::Float(settings.double(&key)? as f32),
            TunableDefault::Int(_) => UniformValue::Int(clamp_i32(settings.int(&key)?)),
            TunableDefault::Bool(_) => UniformValue::Int(i32::from(settings.boolean(&key)?)),
            TunableDefault::Color(fallback) => {
                let raw = settings.string(&key)?;
                UniformValue::Vec4(parse_color(&raw).unwrap_or_else(|| {
                    warn!(%key, value = %raw, "unparseable color, using default");
                    fallback
                }))
            }
        })
    }
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Formats a color as `#rrggbbaa`.
pub fn format_color(rgba: [f32; 4]) -> String {
    let [r, g, b, a] = rgba.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
    format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
}

/// Parses `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)` or `rgba(r, g, b, a)` with
/// 0-255 channels and a 0-1 alpha.
pub fn parse_color(raw: &str) -> Option<[f32; 4]> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix('#') {
        if !matches!(hex.len(), 6 | 8) {
            return None;
        }
        let channel = |i: usize| {
            hex.get(i..i + 2)
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .map(|value| f32::from(value) / 255.0)
        };
        let alpha = if hex.len() == 8 { channel(6)? } else { 1.0 };
        return Some([channel(0)?, channel(2)?, channel(4)?, alpha]);
    }

    let inner = raw
        .strip_prefix("rgba(")
        .or_else(|| raw.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let parts: Vec<f32> = inner
        .split(',')
        .map(|part| part.trim().parse::<f32>().ok())
        .collect::<Option<_>>()?;
    match parts.as_slice() {
        [r, g, b] => Some([r / 255.0, g / 255.0, b / 255.0, 1.0]),
        [r, g, b, a] => Some([r / 255.0, g / 255.0, b / 255.0, *a]),
        _ => None,
    }
}

/// Immutable per-activation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationParams {
    pub window: WindowId,
    pub direction: Direction,
    pub duration: Duration,
    /// Window size in pixels, before the actor is rescaled.
    pub size: [f32; 2],
    pub actor_scale: f32,
    pub test_mode: bool,
}

/// Where per-activation random values come from.
pub enum SeedSource<'a> {
    Random(&'a mut StdRng),
    /// Test mode: every seed is zero.
    Fixed,
}

impl SeedSource<'_> {
    /// Next seed in `[0, 1)`, zero in test mode.
    pub fn next_seed(&mut self) -> f32 {
        match self {
            SeedSource::Random(rng) => rng.gen(),
            SeedSource::Fixed => 0.0,
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        match self {
            SeedSource::Random(rng) => rng.gen(),
            SeedSource::Fixed => 0,
        }
    }
}

/// Uniform writes for one instance, addressed by name.
pub struct UniformWriter<'a> {
    backend: &'a mut dyn ShaderBackend,
    instance: InstanceHandle,
    locations: &'a UniformLocations,
}

impl<'a> UniformWriter<'a> {
    pub fn new(
        backend: &'a mut dyn ShaderBackend,
        instance: InstanceHandle,
        locations: &'a UniformLocations,
    ) -> Self {
        Self {
            backend,
            instance,
            locations,
        }
    }

    /// Writes `value` if the program declares `name`; returns whether it did.
    pub fn set(&mut self, name: &str, value: UniformValue) -> bool {
        match self.locations.get(name) {
            Some(location) => {
                self.backend.set_uniform(self.instance, location, value);
                true
            }
            None => false,
        }
    }
}

/// One-time setup of a freshly constructed instance.
pub struct InstanceSetup<'a> {
    backend: &'a mut dyn ShaderBackend,
    instance: InstanceHandle,
    textures: &'a mut Vec<TextureHandle>,
    seed: u64,
}

impl<'a> InstanceSetup<'a> {
    pub(crate) fn new(
        backend: &'a mut dyn ShaderBackend,
        instance: InstanceHandle,
        textures: &'a mut Vec<TextureHandle>,
        seed: u64,
    ) -> Self {
        Self {
            backend,
            instance,
            textures,
            seed,
        }
    }

    /// Seed for generated resources; zero in test mode.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uploads and binds the auxiliary texture. The instance owns it until
    /// shutdown.
    pub fn attach_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<TextureHandle, ShaderError> {
        let texture = self.backend.create_texture(label, width, height, rgba)?;
        self.backend.bind_texture(self.instance, texture);
        self.textures.push(texture);
        Ok(texture)
    }
}

/// A visual transition style.
///
/// Implementations are stateless descriptors; every piece of GPU state lives
/// in the pooled instances built from them.
pub trait Effect {
    /// Stable identifier, also the settings key prefix.
    fn nick(&self) -> &'static str;

    fn label(&self) -> &'static str;

    fn min_host_version(&self) -> HostVersion {
        HostVersion::MINIMUM
    }

    /// GLSL body declaring its uniforms and `vec4 effect(vec2 uv)`.
    fn fragment_source(&self) -> &'static str;

    /// Default for `<nick>-animation-time`, in milliseconds.
    fn default_animation_time(&self) -> i64 {
        1000
    }

    fn tunables(&self) -> &'static [Tunable] {
        &[]
    }

    /// Factor the window actor is enlarged by while the effect runs.
    fn actor_scale(&self, _settings: &dyn SettingsStore, _direction: Direction) -> f32 {
        1.0
    }

    /// Runs once per constructed instance.
    fn prepare_instance(&self, _setup: &mut InstanceSetup<'_>) -> Result<(), ShaderError> {
        Ok(())
    }

    /// Runs on every activation, after the common uniforms are written.
    fn write_uniforms(
        &self,
        settings: &dyn SettingsStore,
        uniforms: &mut UniformWriter<'_>,
    ) -> Result<(), ShaderError> {
        write_tunables(self.nick(), self.tunables(), settings, uniforms)
    }

    /// Adds the enable flag, the animation time, and every tunable.
    fn extend_schema(&self, schema: &mut Schema) {
        let nick = self.nick();
        schema.insert(enable_key(nick), false);
        schema.insert(animation_time_key(nick), self.default_animation_time());
        for tunable in self.tunables() {
            schema.insert(setting_key(nick, tunable.param), tunable.schema_default());
        }
    }
}

/// Uploads each tunable's current setting to its uniform.
pub fn write_tunables(
    nick: &str,
    tunables: &[Tunable],
    settings: &dyn SettingsStore,
    uniforms: &mut UniformWriter<'_>,
) -> Result<(), ShaderError> {
    for tunable in tunables {
        let value = tunable.read(nick, settings)?;
        uniforms.set(tunable.uniform, value);
    }
    Ok(())
}
