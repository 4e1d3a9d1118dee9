//! Shader variations
//!
//! A variation is one stage of a document compiled with one define
//! combination. The compiled state itself belongs to whatever backend compiler
//! is plugged in; the variation only keeps it in an opaque slot next to a
//! validity flag, so reloading a document can drop compiled state without
//! losing the variation's identity.

use std::any::Any;
use std::fmt;

use parking_lot::Mutex;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Both stages, vertex first
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Fragment];

    /// Short name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vertex => "VS",
            Self::Fragment => "PS",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque compiled state attached by a backend
pub type CompiledPayload = Box<dyn Any + Send + Sync>;

/// Turns stage source plus defines into backend state
pub trait VariationCompiler {
    /// Compile `source` for `stage` with `defines` applied
    fn compile(
        &self,
        stage: ShaderStage,
        name: &str,
        source: &str,
        defines: &str,
    ) -> Result<CompiledPayload, String>;
}

#[derive(Default)]
struct VariationState {
    payload: Option<CompiledPayload>,
    compile_count: u32,
    release_count: u32,
}

/// One stage of a shader document under one define combination
pub struct ShaderVariation {
    name: String,
    defines: String,
    stage: ShaderStage,
    state: Mutex<VariationState>,
}

impl ShaderVariation {
    /// Create an uncompiled variation
    pub fn new(stage: ShaderStage, name: impl Into<String>, defines: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defines: defines.into(),
            stage,
            state: Mutex::new(VariationState::default()),
        }
    }

    /// Derived display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical defines
    pub fn defines(&self) -> &str {
        &self.defines
    }

    /// Stage this variation belongs to
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// True while compiled state is attached
    pub fn is_valid(&self) -> bool {
        self.state.lock().payload.is_some()
    }

    /// Attach compiled state
    pub fn set_compiled(&self, payload: CompiledPayload) {
        let mut state = self.state.lock();
        state.payload = Some(payload);
        state.compile_count = state.compile_count.saturating_add(1);
    }

    /// Drop compiled state so the next use recompiles
    pub fn release(&self) {
        let mut state = self.state.lock();
        if state.payload.take().is_some() {
            state.release_count = state.release_count.saturating_add(1);
        }
    }

    /// Borrow the compiled state as `T`
    ///
    /// Returns `None` when the variation is not compiled or the payload is a
    /// different type.
    pub fn with_compiled<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let state = self.state.lock();
        state.payload.as_ref()?.downcast_ref::<T>().map(f)
    }

    /// Number of times compiled state was attached
    pub fn compile_count(&self) -> u32 {
        self.state.lock().compile_count
    }

    /// Number of times compiled state was released
    pub fn release_count(&self) -> u32 {
        self.state.lock().release_count
    }
}

impl fmt::Debug for ShaderVariation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderVariation")
            .field("name", &self.name)
            .field("defines", &self.defines)
            .field("stage", &self.stage)
            .field("valid", &self.is_valid())
            .finish()
    }
}
