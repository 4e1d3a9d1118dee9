//! Include resolution
//!
//! Expands `#include` directives depth-first into one flattened source blob.
//! Paths are relative to the directory of the file containing the directive,
//! so nested includes can refer to their own neighbours.

use crate::resource::{parent_path, ResourceFetch, SourceStream};
use crate::ShaderError;

/// Directive recognized at column 0
pub const INCLUDE_DIRECTIVE: &str = "#include";

/// Character offset at which the include path starts
const INCLUDE_PATH_OFFSET: usize = 9;

/// Flattened source plus everything that went into it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Source with every include expanded in place
    pub text: String,
    /// Included resource names in first-seen order, without the root
    pub includes: Vec<String>,
}

/// Recursive include expander for a single root document
pub struct IncludeResolver<'a> {
    fetch: &'a dyn ResourceFetch,
    document: &'a str,
    max_depth: usize,
    includes: Vec<String>,
}

impl<'a> IncludeResolver<'a> {
    /// Create a resolver for the document named `document`
    pub fn new(fetch: &'a dyn ResourceFetch, document: &'a str, max_depth: usize) -> Self {
        Self {
            fetch,
            document,
            max_depth,
            includes: Vec::new(),
        }
    }

    /// Flatten `source` and every file it includes
    pub fn resolve(mut self, source: &mut dyn SourceStream) -> Result<ResolvedSource, ShaderError> {
        let mut text = String::new();
        self.process(&mut text, source, 0)?;

        log::debug!(
            "Resolved '{}': {} bytes, {} include(s)",
            self.document,
            text.len(),
            self.includes.len()
        );

        Ok(ResolvedSource {
            text,
            includes: self.includes,
        })
    }

    fn process(
        &mut self,
        code: &mut String,
        source: &mut dyn SourceStream,
        depth: usize,
    ) -> Result<(), ShaderError> {
        let source_name = source.name().to_string();
        if source_name != self.document && !self.includes.contains(&source_name) {
            self.includes.push(source_name.clone());
        }

        while !source.is_eof() {
            let line = source.read_line();

            if line.starts_with(INCLUDE_DIRECTIVE) {
                let include = format!("{}{}", parent_path(&source_name), include_target(&line));

                if depth + 1 > self.max_depth {
                    return Err(ShaderError::IncludeDepthExceeded {
                        include,
                        document: self.document.to_string(),
                        depth: self.max_depth,
                    });
                }

                let mut stream = self.fetch.open(&include).map_err(|source| {
                    ShaderError::IncludeResolution {
                        include: include.clone(),
                        document: self.document.to_string(),
                        source,
                    }
                })?;

                self.process(code, stream.as_mut(), depth + 1)?;
            } else {
                code.push_str(&line);
                code.push('\n');
            }
        }

        // Blank line between the contents of different files
        code.push('\n');

        Ok(())
    }
}

/// Resolve a document in one call
pub fn resolve(
    source: &mut dyn SourceStream,
    fetch: &dyn ResourceFetch,
    document: &str,
    max_depth: usize,
) -> Result<ResolvedSource, ShaderError> {
    IncludeResolver::new(fetch, document, max_depth).resolve(source)
}

/// Extract the path from an include directive line
fn include_target(line: &str) -> String {
    let rest: String = line.chars().skip(INCLUDE_PATH_OFFSET).collect();
    rest.replace('"', "").trim().to_string()
}
