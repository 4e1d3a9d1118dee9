//! Stage splitting
//!
//! A shader document holds both the vertex and the fragment program in one
//! text. Each stage is carved out by commenting away the other stage's entry
//! point, which by convention is the last thing in the file:
//!
//! ```text
//! shared declarations
//! void VS(...) { ... }     <- vertex stage keeps this, fragment stage comments it out
//! void PS(...) { ... }     <- fragment stage keeps this, vertex stage comments it out
//! ```
//!
//! GL-style backends additionally need the entry point renamed to `main`.

/// Entry point and declaration markers for one backend family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitConventions {
    /// Vertex entry point
    pub vertex_entry: &'static str,
    /// Fragment entry point
    pub fragment_entry: &'static str,
    /// Entry point name required by the backend when renaming
    pub main_entry: &'static str,
    /// Per-line vertex attribute declaration
    pub attribute_decl: &'static str,
    /// Rename each stage's entry point to `main_entry`
    pub rename_entry: bool,
    /// Comment out attribute declarations in the fragment stage
    pub comment_attributes: bool,
}

/// Target backend family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendMode {
    /// Single `main` entry per stage (OpenGL family)
    EntryRename,
    /// Explicit `VS`/`PS` entry points (Direct3D family)
    DualEntry,
}

impl BackendMode {
    /// Mode selected at build time
    #[cfg(feature = "opengl")]
    pub const ACTIVE: Self = Self::EntryRename;
    /// Mode selected at build time
    #[cfg(not(feature = "opengl"))]
    pub const ACTIVE: Self = Self::DualEntry;

    /// Conventions used by this mode
    pub fn conventions(&self) -> SplitConventions {
        let rename = matches!(self, Self::EntryRename);
        SplitConventions {
            vertex_entry: "void VS(",
            fragment_entry: "void PS(",
            main_entry: "void main(",
            attribute_decl: "attribute ",
            rename_entry: rename,
            comment_attributes: rename,
        }
    }
}

impl Default for BackendMode {
    fn default() -> Self {
        Self::ACTIVE
    }
}

/// Source text for both pipeline stages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageSources {
    pub vertex: String,
    pub fragment: String,
}

impl StageSources {
    /// Combined length of both texts
    pub fn len(&self) -> usize {
        self.vertex.len() + self.fragment.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex.is_empty() && self.fragment.is_empty()
    }
}

/// Split flattened source into vertex and fragment texts
pub fn split(text: &str, mode: BackendMode) -> StageSources {
    split_with(text, &mode.conventions())
}

/// Split using explicit conventions
pub fn split_with(text: &str, conv: &SplitConventions) -> StageSources {
    let commented_vertex = format!("/* {}", conv.vertex_entry);
    let commented_fragment = format!("/* {}", conv.fragment_entry);

    let mut vertex = text.to_string();
    if conv.rename_entry {
        vertex = vertex.replacen(conv.vertex_entry, conv.main_entry, 1);
    }
    vertex = vertex.replacen(conv.fragment_entry, &commented_fragment, 1);
    vertex.push_str("*/\n");

    let mut fragment = text.to_string();
    if conv.comment_attributes {
        fragment = fragment.replace(conv.attribute_decl, &format!("// {}", conv.attribute_decl));
    }
    fragment = fragment.replacen(conv.vertex_entry, &commented_vertex, 1);
    let fragment_entry = if conv.rename_entry {
        conv.main_entry
    } else {
        conv.fragment_entry
    };
    fragment = fragment.replacen(conv.fragment_entry, &format!("*/\n{}", fragment_entry), 1);

    StageSources { vertex, fragment }
}
