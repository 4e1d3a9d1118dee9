//! Hot-reload support for shader documents
//!
//! Watches the resource directory and turns file events into resource names
//! that [`ShaderRegistry::file_changed`] understands.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;

use crate::resource::FileSystemFetcher;
use crate::{ShaderError, ShaderPrepConfig, ShaderRegistry};

/// Debounce state to prevent rapid-fire reloads
struct DebounceState {
    /// Last event time per file
    last_event: HashMap<PathBuf, Instant>,
    debounce_duration: Duration,
}

impl DebounceState {
    fn new(debounce_duration: Duration) -> Self {
        Self {
            last_event: HashMap::new(),
            debounce_duration,
        }
    }

    fn should_trigger(&mut self, path: &Path) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_event.get(path) {
            if now.duration_since(*last) < self.debounce_duration {
                return false;
            }
        }
        self.last_event.insert(path.to_path_buf(), now);
        true
    }
}

/// Watches a resource directory for changed shader files
pub struct ShaderWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<PathBuf>,
    /// Maps absolute paths back to resource names
    resources: FileSystemFetcher,
}

impl ShaderWatcher {
    /// Watch `root` with the default 100ms debounce
    pub fn new(root: &Path) -> Result<Self, ShaderError> {
        Self::with_debounce(root, Duration::from_millis(100))
    }

    /// Watch `config.resource_root` with `config.debounce_ms`
    pub fn from_config(config: &ShaderPrepConfig) -> Result<Self, ShaderError> {
        Self::with_debounce(&config.resource_root, Duration::from_millis(config.debounce_ms))
    }

    /// Watch `root` with a custom debounce duration
    pub fn with_debounce(root: &Path, debounce: Duration) -> Result<Self, ShaderError> {
        // Event paths are absolute and canonical
        let root = std::fs::canonicalize(root)?;

        let (tx, rx) = mpsc::channel();
        let debounce = Arc::new(Mutex::new(DebounceState::new(debounce)));

        let mut watcher = notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
            if let Ok(event) = result {
                Self::handle_event(event, &tx, &debounce);
            }
        })
        .map_err(|e| ShaderError::HotReloadError(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| ShaderError::HotReloadError(format!("Failed to watch directory: {}", e)))?;

        log::info!("Started watching shader directory: {:?}", root);

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            resources: FileSystemFetcher::new(root),
        })
    }

    fn handle_event(event: Event, sender: &Sender<PathBuf>, debounce: &Arc<Mutex<DebounceState>>) {
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return;
        }

        let mut debounce = debounce.lock();
        for path in event.paths {
            if path.is_file() && debounce.should_trigger(&path) {
                let _ = sender.send(path);
            }
        }
    }

    /// Directory being watched
    pub fn root(&self) -> &Path {
        self.resources.root()
    }

    /// Resource names changed since the last poll (non-blocking)
    pub fn poll_changes(&mut self) -> Vec<String> {
        let mut changed = Vec::new();
        while let Ok(path) = self.receiver.try_recv() {
            match self.resources.resource_name(&path) {
                Some(name) if !changed.contains(&name) => changed.push(name),
                Some(_) => {}
                None => log::debug!("Ignoring change outside shader root: {:?}", path),
            }
        }
        changed
    }

    /// Wait up to `timeout` for the next changed resource
    pub fn wait_for_change_timeout(&mut self, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }

            let path = self.receiver.recv_timeout(remaining).ok()?;
            if let Some(name) = self.resources.resource_name(&path) {
                return Some(name);
            }
        }
    }

    /// Poll for changes and reload every affected document in `registry`
    pub fn apply(&mut self, registry: &ShaderRegistry) -> Vec<(String, Result<(), ShaderError>)> {
        self.poll_changes()
            .into_iter()
            .flat_map(|name| registry.file_changed(&name))
            .collect()
    }
}
