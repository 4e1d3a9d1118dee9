//! Shader variation demonstration
//!
//! Shows how one shader document yields per-stage variations keyed by
//! normalized defines.

use std::sync::Arc;

use void_shader_prep::{
    CompiledPayload, MemoryFetcher, ShaderDocument, ShaderStage, VariationCompiler,
};

/// Prepends `#define` lines and keeps the result as the "compiled" payload
struct HeaderCompiler;

impl VariationCompiler for HeaderCompiler {
    fn compile(&self, _stage: ShaderStage, _name: &str, source: &str, defines: &str) -> Result<CompiledPayload, String> {
        let mut code = String::new();
        for define in defines.split(' ').filter(|d| !d.is_empty()) {
            code.push_str(&format!("#define {}\n", define));
        }
        code.push_str(source);
        Ok(Box::new(code))
    }
}

fn main() {
    env_logger::init();

    println!("Shader Variation Demo");
    println!("=====================\n");

    let fetch = Arc::new(
        MemoryFetcher::new()
            .with_file(
                "Shaders/Basic.glsl",
                r#"#include "Lib/Uniforms.glsl"

attribute vec4 iPos;
#ifdef DIFFMAP
attribute vec2 iTexCoord;
#endif

void VS()
{
    gl_Position = cModelViewProj * iPos;
}

void PS()
{
    #ifdef DIFFMAP
    gl_FragColor = texture2D(sDiffMap, vTexCoord) * cMatDiffColor;
    #else
    gl_FragColor = cMatDiffColor;
    #endif
}
"#,
            )
            .with_file(
                "Shaders/Lib/Uniforms.glsl",
                "uniform mat4 cModelViewProj;\nuniform vec4 cMatDiffColor;\nuniform sampler2D sDiffMap;\n",
            ),
    );

    let mut document = ShaderDocument::new("Shaders/Basic.glsl").with_fetch(fetch.clone());
    if let Err(e) = document.reload() {
        eprintln!("❌ Failed to load shader: {}", e);
        return;
    }

    println!("✓ Loaded {} (includes: {:?})", document.name(), document.includes());
    println!("\n--- Vertex source ---\n{}", document.source(ShaderStage::Vertex));
    println!("--- Fragment source ---\n{}", document.source(ShaderStage::Fragment));

    let requests = [
        (ShaderStage::Vertex, ""),
        (ShaderStage::Vertex, "DIFFMAP"),
        (ShaderStage::Vertex, "  DIFFMAP  "),
        (ShaderStage::Fragment, "DIFFMAP ALPHAMASK"),
        (ShaderStage::Fragment, "ALPHAMASK DIFFMAP"),
    ];

    for (stage, defines) in requests {
        match document.compile_variation(stage, defines, &HeaderCompiler) {
            Ok(variation) => println!(
                "{} {:<22} -> {} (compiled {}x)",
                stage,
                format!("{:?}", defines),
                variation.name(),
                variation.compile_count()
            ),
            Err(e) => eprintln!("❌ {}", e),
        }
    }

    println!("\nVariations: {}", document.variation_count());
    println!("Memory use: {} bytes", document.memory_use());

    fetch.insert(
        "Shaders/Lib/Uniforms.glsl",
        "uniform mat4 cModelViewProj;\nuniform vec4 cMatDiffColor;\nuniform vec4 cMatSpecColor;\nuniform sampler2D sDiffMap;\n",
    );
    if let Err(e) = document.reload() {
        eprintln!("❌ Failed to reload shader: {}", e);
        return;
    }

    println!("\n✓ Reloaded; every variation now needs recompiling:");
    for stage in ShaderStage::ALL {
        for variation in document.cache(stage).iter() {
            println!("  {} valid: {}", variation.name(), variation.is_valid());
        }
    }
}
