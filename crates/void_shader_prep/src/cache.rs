//! Per-stage variation cache
//!
//! Maps canonical define hashes to variation handles. Entries are created on
//! first request and live as long as the cache; invalidation only releases
//! their compiled state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::defines::{canonicalize, DefinesHash};
use crate::resource::split_path;
use crate::variation::{ShaderStage, ShaderVariation};

/// Joins the document name and defines in variation names
pub const NAME_SEPARATOR: char = '_';

/// Lazily populated variations for one stage of one document
#[derive(Debug)]
pub struct VariationCache {
    stage: ShaderStage,
    variations: HashMap<DefinesHash, Arc<ShaderVariation>>,
}

impl VariationCache {
    /// Create an empty cache for `stage`
    pub fn new(stage: ShaderStage) -> Self {
        Self {
            stage,
            variations: HashMap::new(),
        }
    }

    /// Stage served by this cache
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Get the variation for `raw_defines`, creating it on first request
    ///
    /// The second value is true when a new variation was created.
    pub fn get_or_create(&mut self, document: &str, raw_defines: &str) -> (Arc<ShaderVariation>, bool) {
        let defines = canonicalize(raw_defines);
        let hash = DefinesHash::of(&defines);

        if let Some(existing) = self.variations.get(&hash) {
            if existing.defines() != defines {
                log::warn!(
                    "Define hash collision in '{}' {}: '{}' reuses variation for '{}'",
                    document,
                    self.stage,
                    defines,
                    existing.defines()
                );
            }
            return (existing.clone(), false);
        }

        let name = variation_name(document, &defines);
        log::debug!("Created {} variation '{}'", self.stage, name);

        let variation = Arc::new(ShaderVariation::new(self.stage, name, defines));
        self.variations.insert(hash, variation.clone());
        (variation, true)
    }

    /// Look up an existing variation without creating one
    pub fn get(&self, raw_defines: &str) -> Option<Arc<ShaderVariation>> {
        self.variations.get(&DefinesHash::from_raw(raw_defines)).cloned()
    }

    /// Release compiled state of every variation, keeping the entries
    pub fn invalidate_all(&mut self) {
        for variation in self.variations.values() {
            variation.release();
        }
    }

    /// Number of variations
    pub fn len(&self) -> usize {
        self.variations.len()
    }

    /// Check if no variation has been created
    pub fn is_empty(&self) -> bool {
        self.variations.is_empty()
    }

    /// Iterate over all variations
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ShaderVariation>> {
        self.variations.values()
    }
}

/// Derive a variation's display name
///
/// `Shaders/Basic.glsl` with `DIFFMAP ALPHAMASK` becomes
/// `Shaders/Basic_DIFFMAP_ALPHAMASK`; with no defines it is `Shaders/Basic`.
pub fn variation_name(document: &str, canonical_defines: &str) -> String {
    let (path, file, _) = split_path(document);
    let mut name = format!(
        "{}{}{}{}",
        path,
        file,
        NAME_SEPARATOR,
        canonical_defines.replace(' ', &NAME_SEPARATOR.to_string())
    );
    if name.ends_with(NAME_SEPARATOR) {
        name.pop();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "Shaders/GLSL/Basic.glsl";

    #[test]
    fn test_variation_name() {
        assert_eq!(variation_name(DOC, "DIFFMAP ALPHAMASK"), "Shaders/GLSL/Basic_DIFFMAP_ALPHAMASK");
        assert_eq!(variation_name(DOC, ""), "Shaders/GLSL/Basic");
        assert_eq!(variation_name("Unlit", "VERTEXCOLOR"), "Unlit_VERTEXCOLOR");
    }

    #[test]
    fn test_repeated_request_returns_same_handle() {
        let mut cache = VariationCache::new(ShaderStage::Vertex);
        let (first, created) = cache.get_or_create(DOC, "A B");
        assert!(created);
        let (second, created) = cache.get_or_create(DOC, "A B");
        assert!(!created);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_spacing_variants_share_entry() {
        let mut cache = VariationCache::new(ShaderStage::Fragment);
        let (first, _) = cache.get_or_create(DOC, "A B");
        let (second, created) = cache.get_or_create(DOC, "  A    B ");

        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.defines(), "A B");
        assert_eq!(second.name(), "Shaders/GLSL/Basic_A_B");
    }

    #[test]
    fn test_token_order_is_significant() {
        let mut cache = VariationCache::new(ShaderStage::Vertex);
        let (ab, _) = cache.get_or_create(DOC, "A B");
        let (ba, created) = cache.get_or_create(DOC, "B A");

        assert!(created);
        assert!(!Arc::ptr_eq(&ab, &ba));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_invalidate_keeps_entries() {
        let mut cache = VariationCache::new(ShaderStage::Vertex);
        let (variation, _) = cache.get_or_create(DOC, "SKINNED");
        variation.set_compiled(Box::new(42u32));

        cache.invalidate_all();

        assert_eq!(cache.len(), 1);
        assert!(!variation.is_valid());
        let again = cache.get("SKINNED").unwrap();
        assert!(Arc::ptr_eq(&variation, &again));
        assert_eq!(again.name(), "Shaders/GLSL/Basic_SKINNED");
    }

    #[test]
    fn test_get_does_not_create() {
        let cache = VariationCache::new(ShaderStage::Vertex);
        assert!(cache.get("X").is_none());
        assert!(cache.is_empty());
    }
}
