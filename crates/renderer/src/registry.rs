use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::backend::{ProgramHandle, ShaderBackend, UniformLocation};
use crate::compile::declared_uniforms;
use crate::effect::Effect;
use crate::ShaderError;

/// Resolved uniform slots of one program, keyed by uniform name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformLocations {
    slots: HashMap<String, UniformLocation>,
}

impl UniformLocations {
    pub fn get(&self, name: &str) -> Option<UniformLocation> {
        self.slots.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub handle: ProgramHandle,
    pub locations: UniformLocations,
}

/// Compiled programs keyed by effect nick. Compilation and uniform lookup
/// happen once per effect type; failures are not cached so the next
/// activation retries.
#[derive(Debug, Default)]
pub struct ProgramRegistry {
    programs: HashMap<&'static str, CompiledProgram>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiled program for `nick`.
    pub fn get(&self, nick: &str) -> Option<&CompiledProgram> {
        self.programs.get(nick)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Returns the cached program for `effect`, compiling it on first use.
    /// A failed compile is not cached, so the next call retries.
    pub fn get_or_compile(
        &mut self,
        effect: &dyn Effect,
        backend: &mut dyn ShaderBackend,
    ) -> Result<&CompiledProgram, ShaderError> {
        match self.programs.entry(effect.nick()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let source = effect.fragment_source();
                let handle = backend.compile(effect.nick(), source)?;
                let mut slots = HashMap::new();
                for uniform in declared_uniforms(source) {
                    match backend.uniform_location(handle, &uniform.name) {
                        Some(location) => {
                            slots.insert(uniform.name, location);
                        }
                        None => {
                            warn!(effect = effect.nick(), uniform = %uniform.name, "uniform has no location")
                        }
                    }
                }
                debug!(effect = effect.nick(), uniforms = slots.len(), "registered program");
                Ok(entry.insert(CompiledProgram {
                    handle,
                    locations: UniformLocations { slots },
                }))
            }
        }
    }

    /// Destroys every compiled program.
    pub fn destroy_all(&mut self, backend: &mut dyn ShaderBackend) {
        for (nick, program) in self.programs.drain() {
            debug!(effect = nick, "destroying program");
            backend.destroy_program(program.handle);
        }
    }
}
