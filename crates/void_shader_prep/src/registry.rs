//! Shader document registry
//!
//! Owns loaded documents by resource name and reloads them when any file they
//! were built from changes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::document::ShaderDocument;
use crate::resource::{sanitize_name, DependencyMap, DependencyTracker, FileSystemFetcher, ResourceFetch};
use crate::variation::ShaderStage;
use crate::{ShaderError, ShaderPrepConfig};

/// Shared handle to a registered document
pub type DocumentHandle = Arc<RwLock<ShaderDocument>>;

type ReloadListener = Box<dyn Fn(&str, u32) + Send + Sync>;

/// Registry of shader documents
pub struct ShaderRegistry {
    config: ShaderPrepConfig,
    fetch: Arc<dyn ResourceFetch>,
    dependencies: Arc<DependencyMap>,
    documents: RwLock<HashMap<String, DocumentHandle>>,
    /// Called with (document name, load count) after every successful load
    listeners: RwLock<Vec<ReloadListener>>,
}

impl ShaderRegistry {
    /// Create a registry reading through `fetch`
    pub fn new(fetch: Arc<dyn ResourceFetch>, config: ShaderPrepConfig) -> Self {
        Self {
            config,
            fetch,
            dependencies: Arc::new(DependencyMap::new()),
            documents: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Create a registry reading from `config.resource_root`
    pub fn from_config(config: ShaderPrepConfig) -> Self {
        let fetch = Arc::new(FileSystemFetcher::new(config.resource_root.clone()));
        Self::new(fetch, config)
    }

    /// Get a document, loading it on first request
    ///
    /// The document is loaded without holding the registry lock. When two
    /// threads load the same name at once, the first insert wins and the
    /// other document is dropped.
    pub fn load(&self, name: &str) -> Result<DocumentHandle, ShaderError> {
        let name = sanitize_name(name);
        if let Some(existing) = self.get(&name) {
            return Ok(existing);
        }

        let mut document = ShaderDocument::new(name.clone())
            .with_fetch(self.fetch.clone())
            .with_dependencies(self.dependencies.clone())
            .with_max_include_depth(self.config.max_include_depth);

        if let Err(e) = document.reload() {
            log::error!("Failed to load shader '{}': {}", name, e);
            return Err(e);
        }

        let load_count = document.load_count();
        let loaded = Arc::new(RwLock::new(document));
        let handle = self
            .documents
            .write()
            .entry(name.clone())
            .or_insert_with(|| loaded.clone())
            .clone();

        if !Arc::ptr_eq(&handle, &loaded) {
            log::debug!("Shader '{}' was loaded concurrently, discarding duplicate", name);
            return Ok(handle);
        }

        log::info!("Loaded shader '{}'", name);
        self.notify_listeners(&name, load_count);
        Ok(handle)
    }

    /// Get a loaded document
    pub fn get(&self, name: &str) -> Option<DocumentHandle> {
        self.documents.read().get(&sanitize_name(name)).cloned()
    }

    /// Reload a loaded document
    ///
    /// On failure the document keeps its previous sources and variations.
    pub fn reload(&self, name: &str) -> Result<(), ShaderError> {
        let handle = self
            .get(name)
            .ok_or_else(|| ShaderError::NotFound(name.to_string()))?;

        let mut document = handle.write();
        match document.reload() {
            Ok(()) => {
                let load_count = document.load_count();
                let name = document.name().to_string();
                drop(document);

                log::info!("Reloaded shader '{}'", name);
                self.notify_listeners(&name, load_count);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to reload shader '{}', keeping previous version: {}", document.name(), e);
                Err(e)
            }
        }
    }

    /// Reload every document affected by a change to `resource`
    ///
    /// Affected documents are the ones that include `resource` plus the
    /// document named `resource` itself, if loaded.
    pub fn file_changed(&self, resource: &str) -> Vec<(String, Result<(), ShaderError>)> {
        let resource = sanitize_name(resource);
        let mut affected = self.dependencies.dependents_of(&resource);
        if self.contains(&resource) && !affected.contains(&resource) {
            affected.push(resource.clone());
        }

        if affected.is_empty() {
            log::debug!("Changed resource '{}' not used by any shader", resource);
        }

        affected
            .into_iter()
            .map(|name| {
                let result = self.reload(&name);
                (name, result)
            })
            .collect()
    }

    /// Remove a document from the registry
    ///
    /// Its dependencies are cleared once the last handle is dropped.
    pub fn release(&self, name: &str) -> Option<DocumentHandle> {
        let removed = self.documents.write().remove(&sanitize_name(name));
        if removed.is_some() {
            log::debug!("Released shader '{}'", name);
        }
        removed
    }

    /// Check if a document is loaded
    pub fn contains(&self, name: &str) -> bool {
        self.documents.read().contains_key(&sanitize_name(name))
    }

    /// Names of all loaded documents
    pub fn all_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.documents.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of loaded documents
    pub fn count(&self) -> usize {
        self.documents.read().len()
    }

    /// Dependency tracker shared by all documents
    pub fn dependencies(&self) -> &DependencyMap {
        &self.dependencies
    }

    /// Configuration
    pub fn config(&self) -> &ShaderPrepConfig {
        &self.config
    }

    /// Add a listener called after each successful (re)load
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&str, u32) + Send + Sync + 'static,
    {
        self.listeners.write().push(Box::new(listener));
    }

    /// Clear all listeners
    pub fn clear_listeners(&self) {
        self.listeners.write().clear();
    }

    fn notify_listeners(&self, name: &str, load_count: u32) {
        let listeners = self.listeners.read();
        for listener in listeners.iter() {
            listener(name, load_count);
        }
    }

    /// Get statistics about the registry
    pub fn stats(&self) -> RegistryStats {
        let handles: Vec<_> = self.documents.read().values().cloned().collect();
        let mut stats = RegistryStats {
            total_documents: handles.len(),
            ..RegistryStats::default()
        };

        for handle in handles {
            let document = handle.read();
            stats.total_variations += document.variation_count();
            stats.compiled_variations += ShaderStage::ALL
                .iter()
                .flat_map(|stage| document.cache(*stage).iter())
                .filter(|variation| variation.is_valid())
                .count();
            stats.total_memory_bytes += document.memory_use();
        }

        stats
    }
}

/// Registry statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Loaded documents
    pub total_documents: usize,
    /// Variations across all documents and stages
    pub total_variations: usize,
    /// Variations currently holding compiled state
    pub compiled_variations: usize,
    /// Sum of document memory estimates
    pub total_memory_bytes: usize,
}
