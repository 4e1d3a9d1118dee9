//! Shader documents
//!
//! A document is one shader resource: the flattened vertex and fragment
//! sources plus the variations created from them. Loading is all-or-nothing;
//! every step that can fail runs before the document is touched.

use std::mem;
use std::sync::Arc;

use crate::cache::VariationCache;
use crate::include::IncludeResolver;
use crate::resource::{DependencyTracker, OwnerId, ResourceFetch, SourceStream};
use crate::split::{split, BackendMode, StageSources};
use crate::variation::{ShaderStage, ShaderVariation, VariationCompiler};
use crate::{ShaderError, DEFAULT_MAX_INCLUDE_DEPTH};

/// Memory charged per variation
pub const VARIATION_OVERHEAD: usize = mem::size_of::<ShaderVariation>();

/// A loaded shader resource
pub struct ShaderDocument {
    name: String,
    owner: OwnerId,
    sources: StageSources,
    includes: Vec<String>,
    vertex: VariationCache,
    fragment: VariationCache,
    memory_use: usize,
    load_count: u32,
    max_include_depth: usize,
    fetch: Option<Arc<dyn ResourceFetch>>,
    dependencies: Option<Arc<dyn DependencyTracker>>,
}

impl ShaderDocument {
    /// Create an empty document
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: OwnerId::next(),
            sources: StageSources::default(),
            includes: Vec::new(),
            vertex: VariationCache::new(ShaderStage::Vertex),
            fragment: VariationCache::new(ShaderStage::Fragment),
            memory_use: mem::size_of::<Self>(),
            load_count: 0,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            fetch: None,
            dependencies: None,
        }
    }

    /// Attach the resource fetcher used for includes
    pub fn with_fetch(mut self, fetch: Arc<dyn ResourceFetch>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    /// Attach the tracker that receives include dependencies
    pub fn with_dependencies(mut self, dependencies: Arc<dyn DependencyTracker>) -> Self {
        self.dependencies = Some(dependencies);
        self
    }

    /// Limit include nesting
    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Resource name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity used when recording dependencies
    pub fn owner_id(&self) -> OwnerId {
        self.owner
    }

    /// Load from `source`, replacing both stage texts on success
    ///
    /// Existing variations are kept but lose their compiled state. On failure
    /// the document is left exactly as it was.
    pub fn load(&mut self, source: &mut dyn SourceStream) -> Result<(), ShaderError> {
        let fetch = self
            .fetch
            .as_deref()
            .ok_or(ShaderError::MissingSubsystem("resource fetch"))?;

        let resolved = IncludeResolver::new(fetch, &self.name, self.max_include_depth).resolve(source)?;
        let sources = split(&resolved.text, BackendMode::ACTIVE);

        if let Some(dependencies) = &self.dependencies {
            dependencies.reset_dependencies(self.owner);
            for include in &resolved.includes {
                dependencies.store_dependency(self.owner, &self.name, include);
            }
        }

        self.vertex.invalidate_all();
        self.fragment.invalidate_all();

        self.sources = sources;
        self.includes = resolved.includes;
        self.load_count = self.load_count.saturating_add(1);
        self.memory_use = mem::size_of::<Self>()
            + self.sources.len()
            + (self.vertex.len() + self.fragment.len()) * VARIATION_OVERHEAD;

        log::debug!(
            "Loaded shader '{}' ({} include(s), {} bytes)",
            self.name,
            self.includes.len(),
            self.memory_use
        );
        Ok(())
    }

    /// Load again from the attached fetcher, using the document's own name
    pub fn reload(&mut self) -> Result<(), ShaderError> {
        let fetch = self
            .fetch
            .clone()
            .ok_or(ShaderError::MissingSubsystem("resource fetch"))?;
        let mut stream = fetch.open(&self.name)?;
        self.load(stream.as_mut())
    }

    /// Get or create the variation of `stage` for `defines`
    pub fn variation(&mut self, stage: ShaderStage, defines: &str) -> Arc<ShaderVariation> {
        let cache = match stage {
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Fragment => &mut self.fragment,
        };
        let (variation, created) = cache.get_or_create(&self.name, defines);
        if created {
            self.memory_use += VARIATION_OVERHEAD;
        }
        variation
    }

    /// Get a variation and compile it if it has no compiled state
    pub fn compile_variation(
        &mut self,
        stage: ShaderStage,
        defines: &str,
        compiler: &dyn VariationCompiler,
    ) -> Result<Arc<ShaderVariation>, ShaderError> {
        let variation = self.variation(stage, defines);
        if variation.is_valid() {
            return Ok(variation);
        }

        let payload = compiler
            .compile(stage, variation.name(), self.source(stage), variation.defines())
            .map_err(|message| ShaderError::CompileError {
                variation: variation.name().to_string(),
                message,
            })?;
        variation.set_compiled(payload);

        log::debug!("Compiled variation '{}'", variation.name());
        Ok(variation)
    }

    /// Existing variation of `stage` for `defines`, if any
    pub fn existing_variation(&self, stage: ShaderStage, defines: &str) -> Option<Arc<ShaderVariation>> {
        self.cache(stage).get(defines)
    }

    /// Variation cache of `stage`
    pub fn cache(&self, stage: ShaderStage) -> &VariationCache {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }

    /// Flattened source of `stage`
    pub fn source(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.sources.vertex,
            ShaderStage::Fragment => &self.sources.fragment,
        }
    }

    /// Resources included by the last successful load
    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    /// Approximate memory use in bytes
    pub fn memory_use(&self) -> usize {
        self.memory_use
    }

    /// Total variations across both stages
    pub fn variation_count(&self) -> usize {
        self.vertex.len() + self.fragment.len()
    }

    /// Number of successful loads
    pub fn load_count(&self) -> u32 {
        self.load_count
    }

    /// Check if at least one load succeeded
    pub fn is_loaded(&self) -> bool {
        self.load_count > 0
    }
}

impl Drop for ShaderDocument {
    fn drop(&mut self) {
        if let Some(dependencies) = &self.dependencies {
            dependencies.reset_dependencies(self.owner);
        }
    }
}

impl std::fmt::Debug for ShaderDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderDocument")
            .field("name", &self.name)
            .field("includes", &self.includes)
            .field("variations", &self.variation_count())
            .field("memory_use", &self.memory_use)
            .field("load_count", &self.load_count)
            .finish()
    }
}
