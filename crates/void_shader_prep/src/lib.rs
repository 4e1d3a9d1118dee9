//! # Void Shader Prep
//!
//! Shader source preprocessing for Void Engine providing:
//! - `#include` resolution into a single flattened source
//! - Vertex/fragment stage splitting from one combined document
//! - Define canonicalization for stable variation keys
//! - Lazily created, reload-aware shader variations
//! - A document registry with dependency-driven reload
//!
//! ## Architecture
//!
//! ```text
//! Source (.glsl/.hlsl) ──► IncludeResolver ──► flattened text ──► split() ──► VS / PS sources
//!                                │                                               │
//!                                ▼                                               ▼
//!                        DependencyTracker                          VariationCache (per stage)
//!                                │                                               │
//!                                ▼                                               ▼
//!                  ShaderRegistry::file_changed ──► reload ──► invalidate ──► ShaderVariation
//! ```

pub mod cache;
pub mod defines;
pub mod document;
pub mod include;
pub mod registry;
pub mod resource;
pub mod split;
pub mod variation;
#[cfg(feature = "hot-reload")]
pub mod hot_reload;

pub use cache::{variation_name, VariationCache};
pub use defines::{canonicalize, DefinesHash};
pub use document::ShaderDocument;
pub use include::{resolve, IncludeResolver, ResolvedSource};
pub use registry::{DocumentHandle, RegistryStats, ShaderRegistry};
pub use resource::{
    DependencyMap, DependencyTracker, FileSystemFetcher, MemoryFetcher, MemoryStream, OwnerId,
    ResourceError, ResourceFetch, SourceStream,
};
pub use split::{split, BackendMode, SplitConventions, StageSources};
pub use variation::{CompiledPayload, ShaderStage, ShaderVariation, VariationCompiler};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Include nesting allowed before resolution gives up
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 64;

/// Preprocessor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderPrepConfig {
    /// Base directory for shader resources
    pub resource_root: PathBuf,
    /// Maximum include nesting
    pub max_include_depth: usize,
    /// Minimum time between two change events for one file (hot-reload)
    pub debounce_ms: u64,
}

impl Default for ShaderPrepConfig {
    fn default() -> Self {
        Self {
            resource_root: PathBuf::from("shaders"),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            debounce_ms: 100,
        }
    }
}

impl ShaderPrepConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ShaderError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ShaderError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Errors from the shader preprocessor
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Required subsystem unavailable: {0}")]
    MissingSubsystem(&'static str),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("Failed to include '{include}' in '{document}': {source}")]
    IncludeResolution {
        include: String,
        document: String,
        #[source]
        source: ResourceError,
    },

    #[error("Include depth limit {depth} exceeded at '{include}' in '{document}'")]
    IncludeDepthExceeded {
        include: String,
        document: String,
        depth: usize,
    },

    #[error("Failed to compile variation '{variation}': {message}")]
    CompileError { variation: String, message: String },

    #[error("Shader not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Hot-reload error: {0}")]
    HotReloadError(String),
}
