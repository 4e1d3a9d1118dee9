//! Resource collaborators
//!
//! The preprocessor never touches the filesystem or a global resource cache
//! directly. Everything it reads comes through a [`ResourceFetch`], and every
//! include it discovers is reported to a [`DependencyTracker`] so that the
//! owning registry can reload documents when one of their files changes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use thiserror::Error;

/// Errors from opening a resource
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Failed to read resource {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Line-oriented source input
pub trait SourceStream {
    /// Resource name of this stream
    fn name(&self) -> &str;

    /// True once every line has been read
    fn is_eof(&self) -> bool;

    /// Read the next line without its terminator
    fn read_line(&mut self) -> String;
}

/// In-memory source stream
#[derive(Debug, Clone)]
pub struct MemoryStream {
    name: String,
    text: String,
    position: usize,
}

impl MemoryStream {
    /// Create a stream over `text`
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            position: 0,
        }
    }
}

impl SourceStream for MemoryStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_eof(&self) -> bool {
        self.position >= self.text.len()
    }

    fn read_line(&mut self) -> String {
        let rest = &self.text[self.position..];
        let (line, consumed) = match rest.find('\n') {
            Some(idx) => (&rest[..idx], idx + 1),
            None => (rest, rest.len()),
        };
        self.position += consumed;
        line.strip_suffix('\r').unwrap_or(line).to_string()
    }
}

/// Opens resources by name
pub trait ResourceFetch: Send + Sync {
    /// Open the named resource for reading
    fn open(&self, name: &str) -> Result<Box<dyn SourceStream>, ResourceError>;
}

/// Fetches resources from a directory on disk
#[derive(Debug, Clone)]
pub struct FileSystemFetcher {
    root: PathBuf,
}

impl FileSystemFetcher {
    /// Create a fetcher rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a filesystem path under the root back to a resource name
    pub fn resource_name(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

impl ResourceFetch for FileSystemFetcher {
    fn open(&self, name: &str) -> Result<Box<dyn SourceStream>, ResourceError> {
        let name = sanitize_name(name);
        if name.is_empty() || name.ends_with('/') {
            return Err(ResourceError::NotFound(name));
        }

        let path = self.root.join(&name);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Box::new(MemoryStream::new(name, text))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ResourceError::NotFound(name)),
            Err(source) => Err(ResourceError::Io { path: name, source }),
        }
    }
}

/// Fetches resources from an in-memory table
#[derive(Default)]
pub struct MemoryFetcher {
    files: RwLock<HashMap<String, String>>,
}

impl MemoryFetcher {
    /// Create an empty fetcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_file(self, name: &str, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    /// Add or replace a file
    pub fn insert(&self, name: &str, text: impl Into<String>) {
        self.files.write().insert(sanitize_name(name), text.into());
    }

    /// Remove a file
    pub fn remove(&self, name: &str) -> Option<String> {
        self.files.write().remove(&sanitize_name(name))
    }

    /// Check if a file exists
    pub fn contains(&self, name: &str) -> bool {
        self.files.read().contains_key(&sanitize_name(name))
    }
}

impl ResourceFetch for MemoryFetcher {
    fn open(&self, name: &str) -> Result<Box<dyn SourceStream>, ResourceError> {
        let name = sanitize_name(name);
        let files = self.files.read();
        let text = files
            .get(&name)
            .ok_or_else(|| ResourceError::NotFound(name.clone()))?;
        Ok(Box::new(MemoryStream::new(name, text.clone())))
    }
}

/// Identity of one dependency owner
///
/// Unique per document instance, including documents that share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Records which resources a document was built from
pub trait DependencyTracker: Send + Sync {
    /// Record that the owner `owner`, known as `name`, must reload when `dependency` changes
    fn store_dependency(&self, owner: OwnerId, name: &str, dependency: &str);

    /// Forget every dependency recorded for `owner`
    fn reset_dependencies(&self, owner: OwnerId);

    /// Names of the owners that recorded `dependency`, sorted and deduplicated
    fn dependents_of(&self, dependency: &str) -> Vec<String>;
}

/// In-memory dependency tracker
#[derive(Debug, Default)]
pub struct DependencyMap {
    /// Dependency name to owners and their names
    dependents: RwLock<HashMap<String, BTreeMap<OwnerId, String>>>,
}

impl DependencyMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Dependencies recorded for `owner`, sorted by name
    pub fn dependencies_of(&self, owner: OwnerId) -> Vec<String> {
        let mut deps: Vec<_> = self
            .dependents
            .read()
            .iter()
            .filter(|(_, owners)| owners.contains_key(&owner))
            .map(|(dep, _)| dep.clone())
            .collect();
        deps.sort();
        deps
    }

    /// Number of tracked dependency names
    pub fn len(&self) -> usize {
        self.dependents.read().len()
    }

    /// Check if nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.dependents.read().is_empty()
    }
}

impl DependencyTracker for DependencyMap {
    fn store_dependency(&self, owner: OwnerId, name: &str, dependency: &str) {
        self.dependents
            .write()
            .entry(sanitize_name(dependency))
            .or_default()
            .insert(owner, name.to_string());
    }

    fn reset_dependencies(&self, owner: OwnerId) {
        let mut dependents = self.dependents.write();
        for owners in dependents.values_mut() {
            owners.remove(&owner);
        }
        dependents.retain(|_, owners| !owners.is_empty());
    }

    fn dependents_of(&self, dependency: &str) -> Vec<String> {
        let names: BTreeSet<String> = self
            .dependents
            .read()
            .get(&sanitize_name(dependency))
            .map(|owners| owners.values().cloned().collect())
            .unwrap_or_default();
        names.into_iter().collect()
    }
}

/// Normalize a resource name
///
/// Backslashes become slashes and `.` segments are dropped. A `..` segment
/// consumes the preceding directory and is discarded at the top level, so a
/// name never climbs above the resource root.
pub fn sanitize_name(name: &str) -> String {
    let name = name.replace('\\', "/");
    let trailing_slash = name.ends_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in name.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut out = segments.join("/");
    if trailing_slash && !out.is_empty() {
        out.push('/');
    }
    out
}

/// Directory part of a resource name, including the trailing `/`
pub fn parent_path(name: &str) -> &str {
    match name.rfind('/') {
        Some(idx) => &name[..=idx],
        None => "",
    }
}

/// Split a resource name into directory, file stem and extension
///
/// The directory keeps its trailing `/` and the extension keeps its leading
/// `.`, so the three parts concatenate back to the input.
pub fn split_path(name: &str) -> (&str, &str, &str) {
    let path = parent_path(name);
    let file = &name[path.len()..];
    match file.rfind('.') {
        Some(idx) => (path, &file[..idx], &file[idx..]),
        None => (path, file, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_stream_lines() {
        let mut stream = MemoryStream::new("a.glsl", "one\r\ntwo\nthree");
        assert!(!stream.is_eof());
        assert_eq!(stream.read_line(), "one");
        assert_eq!(stream.read_line(), "two");
        assert_eq!(stream.read_line(), "three");
        assert!(stream.is_eof());
    }

    #[test]
    fn test_memory_stream_trailing_newline() {
        let mut stream = MemoryStream::new("a.glsl", "one\n\n");
        assert_eq!(stream.read_line(), "one");
        assert!(!stream.is_eof());
        assert_eq!(stream.read_line(), "");
        assert!(stream.is_eof());

        let empty = MemoryStream::new("b.glsl", "");
        assert!(empty.is_eof());
    }

    #[test]
    fn test_memory_fetcher() {
        let fetcher = MemoryFetcher::new().with_file("Shaders/Common.glsl", "x");
        let stream = fetcher.open("Shaders/./Common.glsl").unwrap();
        assert_eq!(stream.name(), "Shaders/Common.glsl");
        assert!(matches!(fetcher.open("Shaders/Missing.glsl"), Err(ResourceError::NotFound(_))));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Shaders\\GLSL\\Basic.glsl"), "Shaders/GLSL/Basic.glsl");
        assert_eq!(sanitize_name("Shaders/GLSL/../Common.glsl"), "Shaders/Common.glsl");
        assert_eq!(sanitize_name("./a//b.glsl"), "a/b.glsl");
        assert_eq!(sanitize_name("../a.glsl"), "a.glsl");
        assert_eq!(sanitize_name("Shaders/../../../etc/passwd"), "etc/passwd");
        assert_eq!(sanitize_name("Shaders/"), "Shaders/");
        assert_eq!(sanitize_name(""), "");
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("Shaders/GLSL/Basic.glsl"), ("Shaders/GLSL/", "Basic", ".glsl"));
        assert_eq!(split_path("Basic"), ("", "Basic", ""));
        assert_eq!(split_path("dir.v2/Basic"), ("dir.v2/", "Basic", ""));
        assert_eq!(parent_path("Basic.glsl"), "");
    }

    #[test]
    fn test_dependency_map() {
        let deps = DependencyMap::new();
        let a = OwnerId::next();
        let b = OwnerId::next();
        deps.store_dependency(a, "A.glsl", "Common.glsl");
        deps.store_dependency(b, "B.glsl", "Common.glsl");
        deps.store_dependency(b, "B.glsl", "Lighting.glsl");

        assert_eq!(deps.dependents_of("Common.glsl"), vec!["A.glsl", "B.glsl"]);
        assert_eq!(deps.dependencies_of(b), vec!["Common.glsl", "Lighting.glsl"]);

        deps.reset_dependencies(b);
        assert_eq!(deps.dependents_of("Common.glsl"), vec!["A.glsl"]);
        assert!(deps.dependents_of("Lighting.glsl").is_empty());
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn test_dependency_owners_with_same_name() {
        let deps = DependencyMap::new();
        let stale = OwnerId::next();
        let current = OwnerId::next();
        assert_ne!(stale, current);

        deps.store_dependency(stale, "Basic.glsl", "Common.glsl");
        deps.store_dependency(current, "Basic.glsl", "Common.glsl");
        assert_eq!(deps.dependents_of("Common.glsl"), vec!["Basic.glsl"]);

        deps.reset_dependencies(stale);
        assert_eq!(deps.dependents_of("Common.glsl"), vec!["Basic.glsl"]);
        assert_eq!(deps.dependencies_of(current), vec!["Common.glsl"]);
    }

    #[test]
    fn test_filesystem_fetcher_stays_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("res");
        std::fs::create_dir_all(root.join("Shaders")).unwrap();
        std::fs::write(dir.path().join("secret.txt"), "SECRET").unwrap();

        let fetcher = FileSystemFetcher::new(&root);
        let result = fetcher.open("Shaders/../../secret.txt");
        assert!(matches!(result, Err(ResourceError::NotFound(ref name)) if name == "secret.txt"));
    }
}
