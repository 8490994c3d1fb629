//! wgpu implementation of [`ShaderBackend`].
//!
//! Each effect program becomes one render pipeline. Each pooled instance owns
//! a uniform buffer plus its bind groups, so several windows can animate the
//! same effect with different parameters in one frame.

mod context;
mod pipeline;
mod uniforms;

use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, warn};
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::backend::{
    InstanceHandle, ProgramHandle, ShaderBackend, TextureHandle, UniformLocation, UniformValue,
};
use crate::compile::{compile_fragment_shader, declared_uniforms, wrap_effect_fragment, UniformLayout};
use crate::ShaderError;

use context::GpuContext;
use pipeline::{create_effect_pipeline, create_sampler, PipelineLayouts};
use uniforms::UniformStaging;

struct Program {
    layout: UniformLayout,
    pipeline: wgpu::RenderPipeline,
}

struct Instance {
    program: ProgramHandle,
    buffer: wgpu::Buffer,
    staging: UniformStaging,
    uniform_bind_group: wgpu::BindGroup,
    aux: Option<TextureHandle>,
    window: Option<wgpu::TextureView>,
    texture_bind_group: Option<wgpu::BindGroup>,
}

struct Texture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// [`ShaderBackend`] drawing through wgpu.
pub struct WgpuBackend {
    context: GpuContext,
    layouts: PipelineLayouts,
    format: wgpu::TextureFormat,
    sampler: wgpu::Sampler,
    placeholder: Texture,
    next_id: u64,
    programs: HashMap<ProgramHandle, Program>,
    instances: HashMap<InstanceHandle, Instance>,
    textures: HashMap<TextureHandle, Texture>,
}

impl WgpuBackend {
    /// Wraps the compositor's device. `format` is the format of the render
    /// targets effects are drawn into.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        Self::with_context(GpuContext::from_parts(device, queue), format)
    }

    /// Creates a private device, for tools and offscreen rendering.
    pub fn headless(format: wgpu::TextureFormat) -> Result<Self> {
        let context = GpuContext::headless(wgpu::PowerPreference::LowPower)?;
        Ok(Self::with_context(context, format))
    }

    fn with_context(context: GpuContext, format: wgpu::TextureFormat) -> Self {
        let layouts = PipelineLayouts::new(&context.device);
        let sampler = create_sampler(&context.device, "effect sampler");
        let placeholder = upload_rgba(&context, "placeholder texture", 1, 1, &[0, 0, 0, 0]);
        Self {
            context,
            layouts,
            format,
            sampler,
            placeholder,
            next_id: 0,
            programs: HashMap::new(),
            instances: HashMap::new(),
            textures: HashMap::new(),
        }
    }

    /// Device programs and instances are created on.
    pub fn device(&self) -> &wgpu::Device {
        &self.context.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.context.queue
    }

    /// Sets the texture holding the window contents the effect samples
    /// through `getInputColor`.
    pub fn set_window_texture(&mut self, instance: InstanceHandle, view: wgpu::TextureView) {
        if let Some(slot) = self.instances.get_mut(&instance) {
            slot.window = Some(view);
            slot.texture_bind_group = None;
        }
    }

    /// Records the draw of `instance` into `pass`, uploading pending uniform
    /// writes first.
    pub fn encode_draw(
        &mut self,
        instance: InstanceHandle,
        pass: &mut wgpu::RenderPass<'_>,
    ) -> Result<(), ShaderError> {
        let slot = self
            .instances
            .get_mut(&instance)
            .ok_or_else(|| ShaderError::Device(format!("unknown instance {instance:?}")))?;
        let program = self
            .programs
            .get(&slot.program)
            .ok_or_else(|| ShaderError::Device(format!("unknown program {:?}", slot.program)))?;

        if let Some(bytes) = slot.staging.take_dirty() {
            self.context.queue.write_buffer(&slot.buffer, 0, bytes);
        }

        if slot.texture_bind_group.is_none() {
            let aux_view = slot
                .aux
                .and_then(|handle| self.textures.get(&handle))
                .map(|texture| &texture.view)
                .unwrap_or(&self.placeholder.view);
            let window_view = slot.window.as_ref().unwrap_or(&self.placeholder.view);
            slot.texture_bind_group = Some(self.context.device.create_bind_group(
                &wgpu::BindGroupDescriptor {
                    label: Some("effect texture bind group"),
                    layout: &self.layouts.texture_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(window_view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(aux_view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ],
                },
            ));
        }

        pass.set_pipeline(&program.pipeline);
        pass.set_bind_group(0, &slot.uniform_bind_group, &[]);
        pass.set_bind_group(1, slot.texture_bind_group.as_ref(), &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn upload_rgba(context: &GpuContext, label: &str, width: u32, height: u32, rgba: &[u8]) -> Texture {
    let texture = context.device.create_texture_with_data(
        &context.queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        rgba,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Texture { texture, view }
}

impl ShaderBackend for WgpuBackend {
    fn compile(&mut self, label: &str, source: &str) -> Result<ProgramHandle, ShaderError> {
        let layout = UniformLayout::new(&declared_uniforms(source));
        let wrapped = wrap_effect_fragment(source, &layout);

        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = compile_fragment_shader(device, label, wrapped);
        let pipeline = create_effect_pipeline(device, &self.layouts, &module, label, self.format);
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ShaderError::Compile {
                label: label.to_string(),
                message: error.to_string(),
            });
        }

        let handle = ProgramHandle(self.next());
        debug!(%label, ?handle, uniforms = layout.fields().len(), "compiled effect program");
        self.programs.insert(handle, Program { layout, pipeline });
        Ok(handle)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.programs
            .get(&program)?
            .layout
            .index_of(name)
            .map(|index| UniformLocation(index as u32))
    }

    fn create_instance(&mut self, program: ProgramHandle) -> Result<InstanceHandle, ShaderError> {
        let layout = self
            .programs
            .get(&program)
            .map(|program| &program.layout)
            .ok_or_else(|| ShaderError::Device(format!("unknown program {program:?}")))?;
        let device = &self.context.device;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("effect uniforms"),
            size: u64::from(layout.size()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("effect uniform bind group"),
            layout: &self.layouts.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        let staging = UniformStaging::new(layout);

        let handle = InstanceHandle(self.next());
        self.instances.insert(
            handle,
            Instance {
                program,
                buffer,
                staging,
                uniform_bind_group,
                aux: None,
                window: None,
                texture_bind_group: None,
            },
        );
        Ok(handle)
    }

    fn set_uniform(&mut self, instance: InstanceHandle, location: UniformLocation, value: UniformValue) {
        let Some(slot) = self.instances.get_mut(&instance) else {
            warn!(?instance, "uniform write to unknown instance");
            return;
        };
        let Some(program) = self.programs.get(&slot.program) else {
            return;
        };
        if !slot
            .staging
            .write(&program.layout, location.0 as usize, value)
        {
            warn!(
                ?instance,
                ?location,
                value = value.type_name(),
                "uniform write does not match declaration"
            );
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
        if width == 0 || height == 0 || rgba.len() != expected {
            return Err(ShaderError::Texture(format!(
                "{label}: expected {expected} bytes for {width}x{height}, got {}",
                rgba.len()
            )));
        }
        let texture = upload_rgba(&self.context, label, width, height, rgba);
        let handle = TextureHandle(self.next());
        self.textures.insert(handle, texture);
        Ok(handle)
    }

    fn bind_texture(&mut self, instance: InstanceHandle, texture: TextureHandle) {
        if let Some(slot) = self.instances.get_mut(&instance) {
            slot.aux = Some(texture);
            slot.texture_bind_group = None;
        }
    }

    fn destroy_instance(&mut self, instance: InstanceHandle) {
        if let Some(slot) = self.instances.remove(&instance) {
            slot.buffer.destroy();
        }
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(entry) = self.textures.remove(&texture) {
            entry.texture.destroy();
        }
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
    }
}
