//! Hot-reload demonstration
//!
//! This example shows:
//! - Loading a shader document with includes from disk
//! - Reloading every document that includes a changed file
//! - Variations losing compiled state on reload
//! - Reload notifications

use std::path::PathBuf;
use std::time::Duration;

use void_shader_prep::hot_reload::ShaderWatcher;
use void_shader_prep::{ShaderPrepConfig, ShaderRegistry, ShaderStage};

fn main() {
    // Initialize logging
    env_logger::init();

    println!("Shader Hot-Reload Demo");
    println!("======================\n");

    let config = ShaderPrepConfig {
        resource_root: PathBuf::from("examples/shaders"),
        ..ShaderPrepConfig::default()
    };

    create_test_shaders(&config.resource_root);

    let registry = ShaderRegistry::from_config(config.clone());
    registry.add_listener(|name, load_count| {
        println!("🔔 Shader '{}' loaded (load #{})", name, load_count);
    });

    println!("📂 Loading Basic.glsl...");
    let document = match registry.load("Basic.glsl") {
        Ok(document) => document,
        Err(e) => {
            eprintln!("❌ Failed to load shader: {}", e);
            return;
        }
    };

    let variation = document.write().variation(ShaderStage::Vertex, "DIFFMAP");
    variation.set_compiled(Box::new(()));
    println!("✓ Variation '{}' compiled\n", variation.name());

    let mut watcher = match ShaderWatcher::from_config(&config) {
        Ok(watcher) => watcher,
        Err(e) => {
            eprintln!("❌ Failed to start file watcher: {}", e);
            return;
        }
    };
    println!("👁️  File watcher started\n");

    println!("Instructions:");
    println!("1. Edit examples/shaders/Uniforms.glsl");
    println!("2. Watch Basic.glsl reload");
    println!("3. Delete Uniforms.glsl to see the previous version kept");
    println!("4. Press Ctrl+C to exit\n");

    loop {
        for (name, result) in watcher.apply(&registry) {
            match result {
                Ok(()) => {
                    println!("✓ Reloaded: {}", name);
                    println!("  '{}' valid: {}", variation.name(), variation.is_valid());
                }
                Err(e) => {
                    println!("❌ Reload of {} failed: {}", name, e);
                    println!("  Keeping previous version");
                }
            }
        }

        std::thread::sleep(Duration::from_millis(100));
    }
}

/// Create test shader files
fn create_test_shaders(dir: &std::path::Path) {
    use std::fs;

    if !dir.exists() {
        fs::create_dir_all(dir).expect("Failed to create shader directory");
    }

    let basic = r#"#include "Uniforms.glsl"

attribute vec4 iPos;

void VS()
{
    gl_Position = cModelViewProj * iPos;
}

void PS()
{
    gl_FragColor = cMatDiffColor;
}
"#;
    let uniforms = "uniform mat4 cModelViewProj;\nuniform vec4 cMatDiffColor;\n";

    for (name, source) in [("Basic.glsl", basic), ("Uniforms.glsl", uniforms)] {
        let path = dir.join(name);
        if !path.exists() {
            fs::write(&path, source).expect("Failed to write test shader");
            println!("📝 Created {:?}", path);
        }
    }
    println!();
}
