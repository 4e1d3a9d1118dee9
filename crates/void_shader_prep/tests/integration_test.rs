//! Integration tests for shader preprocessing
//!
//! Tests the complete load workflow including:
//! - Include resolution from disk
//! - Stage splitting
//! - Variation caching across reloads
//! - Dependency-driven reload through the registry

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use void_shader_prep::{
    canonicalize, resolve, split, BackendMode, CompiledPayload, DependencyTracker, FileSystemFetcher,
    MemoryFetcher, MemoryStream, ShaderDocument, ShaderError, ShaderPrepConfig, ShaderRegistry,
    ShaderStage, VariationCompiler,
};

const BASIC: &str = r#"#include "Uniforms.glsl"
#include "Lib/Transform.glsl"

attribute vec4 iPos;

void VS()
{
    gl_Position = GetClipPos(iPos);
}

void PS()
{
    gl_FragColor = cMatDiffColor;
}
"#;

const UNIFORMS: &str = "uniform vec4 cMatDiffColor;\n";
const TRANSFORM: &str = "#include \"Math.glsl\"\nvec4 GetClipPos(vec4 pos) { return cViewProj * pos; }\n";
const MATH: &str = "uniform mat4 cViewProj;\n";

fn write_shaders(root: &Path) {
    fs::create_dir_all(root.join("Shaders/Lib")).unwrap();
    fs::write(root.join("Shaders/Basic.glsl"), BASIC).unwrap();
    fs::write(root.join("Shaders/Uniforms.glsl"), UNIFORMS).unwrap();
    fs::write(root.join("Shaders/Lib/Transform.glsl"), TRANSFORM).unwrap();
    fs::write(root.join("Shaders/Lib/Math.glsl"), MATH).unwrap();
}

/// Records every compile request
#[derive(Default)]
struct RecordingCompiler {
    requests: Mutex<Vec<(ShaderStage, String)>>,
}

impl VariationCompiler for RecordingCompiler {
    fn compile(&self, stage: ShaderStage, name: &str, source: &str, defines: &str) -> Result<CompiledPayload, String> {
        self.requests.lock().unwrap().push((stage, name.to_string()));
        let header: String = defines
            .split(' ')
            .filter(|d| !d.is_empty())
            .map(|d| format!("#define {}\n", d))
            .collect();
        Ok(Box::new(format!("{}{}", header, source)))
    }
}

#[test]
fn test_flatten_nested_includes_with_blank_lines() {
    let fetcher = MemoryFetcher::new().with_file("inc.h", "incline\n");
    let mut root = MemoryStream::new("R", "line1\n#include \"inc.h\"\nline2\n");

    let resolved = resolve(&mut root, &fetcher, "R", 64).unwrap();
    assert_eq!(resolved.text, "line1\nincline\n\nline2\n\n");
}

#[test]
fn test_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    write_shaders(dir.path());

    let fetch = Arc::new(FileSystemFetcher::new(dir.path()));
    let mut document = ShaderDocument::new("Shaders/Basic.glsl").with_fetch(fetch);
    document.reload().expect("Should load");

    assert_eq!(
        document.includes(),
        ["Shaders/Uniforms.glsl", "Shaders/Lib/Transform.glsl", "Shaders/Lib/Math.glsl"]
    );

    let vertex = document.source(ShaderStage::Vertex);
    assert!(vertex.starts_with("uniform vec4 cMatDiffColor;\n\nuniform mat4 cViewProj;\n\nvec4 GetClipPos"));
    assert!(vertex.ends_with("*/\n"));

    let fragment = document.source(ShaderStage::Fragment);
    assert!(fragment.contains("/* void VS()"));
    assert!(fragment.contains("*/\nvoid "));
}

#[test]
fn test_document_sources_match_split() {
    let dir = tempfile::tempdir().unwrap();
    write_shaders(dir.path());

    let fetch = FileSystemFetcher::new(dir.path());
    let mut root = MemoryStream::new("Shaders/Basic.glsl", BASIC);
    let resolved = resolve(&mut root, &fetch, "Shaders/Basic.glsl", 64).unwrap();
    let expected = split(&resolved.text, BackendMode::ACTIVE);

    let mut document = ShaderDocument::new("Shaders/Basic.glsl").with_fetch(Arc::new(fetch));
    document.load(&mut MemoryStream::new("Shaders/Basic.glsl", BASIC)).unwrap();

    assert_eq!(document.source(ShaderStage::Vertex), expected.vertex);
    assert_eq!(document.source(ShaderStage::Fragment), expected.fragment);
}

#[test]
fn test_missing_include_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    write_shaders(dir.path());
    fs::remove_file(dir.path().join("Shaders/Lib/Math.glsl")).unwrap();

    let fetch = Arc::new(FileSystemFetcher::new(dir.path()));
    let mut document = ShaderDocument::new("Shaders/Basic.glsl").with_fetch(fetch);

    match document.reload() {
        Err(ShaderError::IncludeResolution { include, document: root, .. }) => {
            assert_eq!(include, "Shaders/Lib/Math.glsl");
            assert_eq!(root, "Shaders/Basic.glsl");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!document.is_loaded());
    assert_eq!(document.source(ShaderStage::Vertex), "");
}

#[test]
fn test_include_cannot_leave_resource_root() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("res");
    fs::create_dir_all(root.join("Shaders")).unwrap();
    fs::create_dir_all(dir.path().join("outside")).unwrap();
    fs::write(dir.path().join("outside/secret.txt"), "SECRET\n").unwrap();
    fs::write(
        root.join("Shaders/A.glsl"),
        "#include \"../../outside/secret.txt\"\nvoid VS() {}\nvoid PS() {}\n",
    )
    .unwrap();

    let fetch = Arc::new(FileSystemFetcher::new(&root));
    let mut document = ShaderDocument::new("Shaders/A.glsl").with_fetch(fetch);

    let err = document.reload().unwrap_err();
    assert!(matches!(err, ShaderError::IncludeResolution { .. }));
    assert!(!document.is_loaded());
    assert!(!document.source(ShaderStage::Vertex).contains("SECRET"));
}

#[test]
fn test_variation_lifecycle_across_reload() {
    let dir = tempfile::tempdir().unwrap();
    write_shaders(dir.path());

    let fetch = Arc::new(FileSystemFetcher::new(dir.path()));
    let mut document = ShaderDocument::new("Shaders/Basic.glsl").with_fetch(fetch);
    document.reload().unwrap();

    let compiler = RecordingCompiler::default();
    let skinned = document
        .compile_variation(ShaderStage::Vertex, "  SKINNED   NUMVERTEXLIGHTS ", &compiler)
        .unwrap();
    assert_eq!(skinned.name(), "Shaders/Basic_SKINNED_NUMVERTEXLIGHTS");
    assert_eq!(skinned.defines(), canonicalize("  SKINNED   NUMVERTEXLIGHTS "));
    assert!(skinned
        .with_compiled(|code: &String| code.starts_with("#define SKINNED\n#define NUMVERTEXLIGHTS\n"))
        .unwrap());

    let plain = document.compile_variation(ShaderStage::Fragment, "", &compiler).unwrap();
    assert_eq!(plain.name(), "Shaders/Basic");

    fs::write(dir.path().join("Shaders/Uniforms.glsl"), "uniform vec4 cMatSpecColor;\n").unwrap();
    document.reload().unwrap();
    assert!(!skinned.is_valid());
    assert!(!plain.is_valid());

    let recompiled = document
        .compile_variation(ShaderStage::Vertex, "SKINNED NUMVERTEXLIGHTS", &compiler)
        .unwrap();
    assert!(Arc::ptr_eq(&skinned, &recompiled));
    assert!(recompiled.with_compiled(|code: &String| code.contains("cMatSpecColor")).unwrap());

    let requests = compiler.requests.lock().unwrap();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2], (ShaderStage::Vertex, "Shaders/Basic_SKINNED_NUMVERTEXLIGHTS".to_string()));
    assert_eq!(document.variation_count(), 2);
}

#[test]
fn test_order_sensitive_keys() {
    let fetch = Arc::new(MemoryFetcher::new().with_file("S.glsl", "void VS() {}\nvoid PS() {}\n"));
    let mut document = ShaderDocument::new("S.glsl").with_fetch(fetch);
    document.reload().unwrap();

    let ab = document.variation(ShaderStage::Vertex, "A B");
    let ba = document.variation(ShaderStage::Vertex, "B A");
    assert!(!Arc::ptr_eq(&ab, &ba));
    assert_eq!(ab.name(), "S_A_B");
    assert_eq!(ba.name(), "S_B_A");

    // Same defines in the other stage are a separate entry
    let fragment = document.variation(ShaderStage::Fragment, "A B");
    assert!(!Arc::ptr_eq(&ab, &fragment));
    assert_eq!(document.variation_count(), 3);
}

#[test]
fn test_registry_reload_on_include_change() {
    let dir = tempfile::tempdir().unwrap();
    write_shaders(dir.path());

    let config = ShaderPrepConfig {
        resource_root: dir.path().to_path_buf(),
        ..ShaderPrepConfig::default()
    };
    let registry = ShaderRegistry::from_config(config);

    let reloads = Arc::new(Mutex::new(Vec::new()));
    let reloads_clone = reloads.clone();
    registry.add_listener(move |name, count| {
        reloads_clone.lock().unwrap().push((name.to_string(), count));
    });

    let handle = registry.load("Shaders/Basic.glsl").unwrap();
    let variation = handle.write().variation(ShaderStage::Vertex, "DIFFMAP");
    variation.set_compiled(Box::new(1u32));

    assert_eq!(
        registry.dependencies().dependents_of("Shaders/Lib/Math.glsl"),
        vec!["Shaders/Basic.glsl"]
    );

    fs::write(dir.path().join("Shaders/Lib/Math.glsl"), "uniform mat4 cView;\n").unwrap();
    let results = registry.file_changed("Shaders/Lib/Math.glsl");
    assert_eq!(results.len(), 1);
    assert!(results[0].1.is_ok());

    assert!(!variation.is_valid());
    assert!(handle.read().source(ShaderStage::Vertex).contains("cView;"));

    let reloads = reloads.lock().unwrap();
    assert_eq!(
        *reloads,
        vec![("Shaders/Basic.glsl".to_string(), 1), ("Shaders/Basic.glsl".to_string(), 2)]
    );
}

#[test]
fn test_registry_include_cycle() {
    let fetch = Arc::new(
        MemoryFetcher::new()
            .with_file("Shaders/A.glsl", "#include \"B.glsl\"\n")
            .with_file("Shaders/B.glsl", "#include \"A.glsl\"\n"),
    );
    let config = ShaderPrepConfig {
        max_include_depth: 8,
        ..ShaderPrepConfig::default()
    };
    let registry = ShaderRegistry::new(fetch, config);

    let result = registry.load("Shaders/A.glsl");
    assert!(matches!(result, Err(ShaderError::IncludeDepthExceeded { depth: 8, .. })));
    assert!(!registry.contains("Shaders/A.glsl"));
}
