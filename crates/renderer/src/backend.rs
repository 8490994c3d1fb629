//! The GPU seam consumed by the pool and the animation driver.
//!
//! Everything above this module talks to the GPU through opaque handles so
//! that the lifecycle engine can run against [`RecordingBackend`] in tests and
//! against [`crate::WgpuBackend`] in a compositor.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::compile::declared_uniforms;
use crate::ShaderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

/// Backend-specific slot for one uniform of a compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
}

impl UniformValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            UniformValue::Float(_) => "float",
            UniformValue::Vec2(_) => "vec2",
            UniformValue::Vec3(_) => "vec3",
            UniformValue::Vec4(_) => "vec4",
            UniformValue::Int(_) => "int",
        }
    }
}

/// Compiles effect programs and owns the per-instance GPU state.
///
/// A program is compiled once per effect type. Each pooled shader instance
/// gets its own uniform storage and texture bindings on top of a shared
/// program.
pub trait ShaderBackend {
    fn compile(&mut self, label: &str, source: &str) -> Result<ProgramHandle, ShaderError>;

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    fn create_instance(&mut self, program: ProgramHandle) -> Result<InstanceHandle, ShaderError>;

    fn set_uniform(&mut self, instance: InstanceHandle, location: UniformLocation, value: UniformValue);

    /// Uploads an RGBA8 texture.
    fn create_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<TextureHandle, ShaderError>;

    /// Binds `texture` as the auxiliary texture of `instance`.
    fn bind_texture(&mut self, instance: InstanceHandle, texture: TextureHandle);

    fn destroy_instance(&mut self, instance: InstanceHandle);

    fn destroy_texture(&mut self, texture: TextureHandle);

    fn destroy_program(&mut self, program: ProgramHandle);
}

/// One call observed by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Compile { label: String, program: ProgramHandle },
    CreateInstance { program: ProgramHandle, instance: InstanceHandle },
    SetUniform { instance: InstanceHandle, name: String, value: UniformValue },
    CreateTexture { label: String, texture: TextureHandle, width: u32, height: u32 },
    BindTexture { instance: InstanceHandle, texture: TextureHandle },
    DestroyInstance(InstanceHandle),
    DestroyTexture(TextureHandle),
    DestroyProgram(ProgramHandle),
}

/// Headless backend that records every call.
///
/// Uniform locations are assigned from the `uniform` declarations found in
/// the compiled source, so effects see the same lookups they would on a GPU.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u64,
    calls: Vec<BackendCall>,
    programs: HashMap<ProgramHandle, Vec<String>>,
    instances: HashMap<InstanceHandle, ProgramHandle>,
    textures: HashSet<TextureHandle>,
    failing: HashSet<String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every future compile of `label` fail.
    pub fn fail_compiles_of(&mut self, label: impl Into<String>) {
        self.failing.insert(label.into());
    }

    /// Lets compiles of `label` succeed again after `fail_compiles_of`.
    pub fn allow_compiles_of(&mut self, label: &str) {
        self.failing.remove(label);
    }

    /// Every backend call so far, in order.
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Successful compiles so far.
    pub fn compile_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Compile { .. }))
            .count()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Instances created and not yet destroyed.
    pub fn live_instances(&self) -> usize {
        self.instances.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Uniform writes for `instance`, in call order.
    pub fn uniform_writes(&self, instance: InstanceHandle) -> Vec<(String, UniformValue)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::SetUniform {
                    instance: target,
                    name,
                    value,
                } if *target == instance => Some((name.clone(), *value)),
                _ => None,
            })
            .collect()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl ShaderBackend for RecordingBackend {
    fn compile(&mut self, label: &str, source: &str) -> Result<ProgramHandle, ShaderError> {
        if self.failing.contains(label) {
            return Err(ShaderError::Compile {
                label: label.to_string(),
                message: "compilation disabled for this label".to_string(),
            });
        }
        let program = ProgramHandle(self.next());
        let names = declared_uniforms(source)
            .into_iter()
            .map(|uniform| uniform.name)
            .collect();
        self.programs.insert(program, names);
        self.calls.push(BackendCall::Compile {
            label: label.to_string(),
            program,
        });
        Ok(program)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.programs
            .get(&program)?
            .iter()
            .position(|candidate| candidate == name)
            .map(|index| UniformLocation(index as u32))
    }

    fn create_instance(&mut self, program: ProgramHandle) -> Result<InstanceHandle, ShaderError> {
        if !self.programs.contains_key(&program) {
            return Err(ShaderError::Device(format!("unknown program {program:?}")));
        }
        let instance = InstanceHandle(self.next());
        self.instances.insert(instance, program);
        self.calls
            .push(BackendCall::CreateInstance { program, instance });
        Ok(instance)
    }

    fn set_uniform(&mut self, instance: InstanceHandle, location: UniformLocation, value: UniformValue) {
        let name = self
            .instances
            .get(&instance)
            .and_then(|program| self.programs.get(program))
            .and_then(|names| names.get(location.0 as usize))
            .cloned();
        match name {
            Some(name) => self.calls.push(BackendCall::SetUniform {
                instance,
                name,
                value,
            }),
            None => warn!(?instance, ?location, "uniform write to unknown slot"),
        }
    }

    fn create_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<TextureHandle, ShaderError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(ShaderError::Texture(format!(
                "{label}: expected {expected} bytes, got {}",
                rgba.len()
            )));
        }
        let texture = TextureHandle(self.next());
        self.textures.insert(texture);
        self.calls.push(BackendCall::CreateTexture {
            label: label.to_string(),
            texture,
            width,
            height,
        });
        Ok(texture)
    }

    fn bind_texture(&mut self, instance: InstanceHandle, texture: TextureHandle) {
        self.calls
            .push(BackendCall::BindTexture { instance, texture });
    }

    fn destroy_instance(&mut self, instance: InstanceHandle) {
        if self.instances.remove(&instance).is_some() {
            self.calls.push(BackendCall::DestroyInstance(instance));
        }
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture) {
            self.calls.push(BackendCall::DestroyTexture(texture));
        }
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_some() {
            debug!(?program, "destroyed program");
            self.calls.push(BackendCall::DestroyProgram(program));
        }
    }
}
