use crate::backend::UniformValue;
use crate::compile::{UniformLayout, UniformType};

/// CPU-side copy of one instance's uniform block, flushed to the GPU before
/// each draw.
pub(crate) struct UniformStaging {
    bytes: Vec<u8>,
    dirty: bool,
}

impl UniformStaging {
    pub fn new(layout: &UniformLayout) -> Self {
        Self {
            bytes: vec![0; layout.size() as usize],
            dirty: true,
        }
    }

    /// Writes `value` into the field at `index`. Returns false when the
    /// value does not match the declared type.
    pub fn write(&mut self, layout: &UniformLayout, index: usize, value: UniformValue) -> bool {
        let Some(field) = layout.field(index) else {
            return false;
        };
        let offset = field.offset as usize;
        match (field.ty, value) {
            (UniformType::Float, UniformValue::Float(v)) => self.put(offset, bytemuck::bytes_of(&v)),
            (UniformType::Int, UniformValue::Int(v)) => self.put(offset, bytemuck::bytes_of(&v)),
            (UniformType::Vec2, UniformValue::Vec2(v)) => self.put(offset, bytemuck::cast_slice(&v)),
            (UniformType::Vec3, UniformValue::Vec3(v)) => self.put(offset, bytemuck::cast_slice(&v)),
            (UniformType::Vec4, UniformValue::Vec4(v)) => self.put(offset, bytemuck::cast_slice(&v)),
            _ => return false,
        }
        true
    }

    fn put(&mut self, offset: usize, data: &[u8]) {
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
        self.dirty = true;
    }

    /// Returns the block if it changed since the last call.
    pub fn take_dirty(&mut self) -> Option<&[u8]> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(&self.bytes)
    }

    #[cfg(test)]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
