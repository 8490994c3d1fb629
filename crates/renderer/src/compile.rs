use std::borrow::Cow;

use tracing::warn;
use wgpu::naga::ShaderStage;

/// Scalar and vector types an effect may declare as a plain `uniform`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformType {
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
}

impl UniformType {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "float" => Some(Self::Float),
            "int" => Some(Self::Int),
            "vec2" => Some(Self::Vec2),
            "vec3" => Some(Self::Vec3),
            "vec4" => Some(Self::Vec4),
            _ => None,
        }
    }

    /// GLSL spelling of the type.
    pub fn glsl(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Int => "int",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
        }
    }

    /// std140 (size, alignment) in bytes.
    fn std140(self) -> (u32, u32) {
        match self {
            Self::Float | Self::Int => (4, 4),
            Self::Vec2 => (8, 8),
            Self::Vec3 => (12, 16),
            Self::Vec4 => (16, 16),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredUniform {
    pub name: String,
    pub ty: UniformType,
}

/// Collects `uniform <type> <name>;` declarations in source order.
pub fn declared_uniforms(source: &str) -> Vec<DeclaredUniform> {
    source.lines().filter_map(parse_uniform_line).collect()
}

fn parse_uniform_line(line: &str) -> Option<DeclaredUniform> {
    let trimmed = line.trim();
    if !trimmed.starts_with("uniform ") {
        return None;
    }
    let tokens: Vec<&str> = trimmed
        .trim_end_matches(';')
        .split_whitespace()
        .collect();
    let [.., ty, name] = tokens.as_slice() else {
        return None;
    };
    let Some(ty) = UniformType::parse(ty) else {
        warn!(line = trimmed, "ignoring unsupported uniform declaration");
        return None;
    };
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        warn!(line = trimmed, "ignoring unsupported uniform declaration");
        return None;
    }
    Some(DeclaredUniform {
        name: (*name).to_string(),
        ty,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub ty: UniformType,
    pub offset: u32,
}

/// std140 layout of the per-instance uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    fields: Vec<UniformField>,
    size: u32,
}

impl UniformLayout {
    /// Lays `declared` out with std140 rules, in declaration order.
    pub fn new(declared: &[DeclaredUniform]) -> Self {
        let mut fields = Vec::with_capacity(declared.len());
        let mut cursor = 0u32;
        for uniform in declared {
            let (size, align) = uniform.ty.std140();
            let offset = cursor.next_multiple_of(align);
            fields.push(UniformField {
                name: uniform.name.clone(),
                ty: uniform.ty,
                offset,
            });
            cursor = offset + size;
        }
        // Uniform buffers must be non-empty and a multiple of 16 bytes.
        let size = cursor.max(16).next_multiple_of(16);
        Self { fields, size }
    }

    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&UniformField> {
        self.fields.get(index)
    }

    /// Field index of the uniform called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Block size in bytes, rounded up to 16.
    pub fn size(&self) -> u32 {
        self.size
    }
}

/// Produces a self-contained GLSL 450 fragment shader from an effect body.
///
/// The effect declares its parameters as plain `uniform` lines and defines
/// `vec4 effect(vec2 uv)`. Those lines are removed and rewritten into one
/// std140 block, each name aliased by a macro. The header also exposes the
/// window texture through `getInputColor(uv)` and the per-instance auxiliary
/// texture as `uAuxTexture`.
pub fn wrap_effect_fragment(source: &str, layout: &UniformLayout) -> String {
    let mut body = String::with_capacity(source.len());
    let mut skipped_version = false;
    for line in source.lines() {
        let trimmed = line.trim_start();
        if !skipped_version && trimmed.starts_with("#version") {
            skipped_version = true;
            continue;
        }
        if trimmed.starts_with("uniform ") {
            continue;
        }
        body.push_str(line);
        body.push('\n');
    }

    let mut block = String::new();
    let mut aliases = String::new();
    for field in layout.fields() {
        block.push_str(&format!("    {} _{};\n", field.ty.glsl(), field.name));
        aliases.push_str(&format!("#define {0} params._{0}\n", field.name));
    }
    if layout.fields().is_empty() {
        block.push_str("    vec4 _emberfx_unused;\n");
    }

    format!(
        "{HEADER_PRELUDE}layout(std140, set = 0, binding = 0) uniform EffectParams {{\n{block}}} params;\n{aliases}{HEADER_TEXTURES}\n#line 1\n{body}{FOOTER}"
    )
}

pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("emberfx quad vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    label: &str,
    wrapped: String,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(wrapped),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    })
}

const HEADER_PRELUDE: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

";

const HEADER_TEXTURES: &str = r"
layout(set = 1, binding = 0) uniform texture2D emberfx_window_texture;
layout(set = 1, binding = 1) uniform sampler emberfx_window_sampler;
layout(set = 1, binding = 2) uniform texture2D emberfx_aux_texture;
layout(set = 1, binding = 3) uniform sampler emberfx_aux_sampler;

#define uAuxTexture sampler2D(emberfx_aux_texture, emberfx_aux_sampler)

vec4 getInputColor(vec2 uv) {
    return texture(sampler2D(emberfx_window_texture, emberfx_window_sampler), uv);
}
";

const FOOTER: &str = r"
void main() {
    outColor = effect(v_uv);
}
";

/// Full-screen triangle; the effect quad is the window actor's bounds.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    vec2 pos = positions[uint(gl_VertexIndex)];
    v_uv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";
