// SPDX-License-Identifier: CEPL-1.0
//! With `embed-shaders`, compiles `shaders/mesh.{vert,frag}` to SPIR-V in
//! OUT_DIR so `ShaderSet::embedded` can include them.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    #[cfg(feature = "embed-shaders")]
    embed::compile_all();
}

#[cfg(feature = "embed-shaders")]
mod embed {
    use std::{env, fs, path::PathBuf};

    const SHADERS: [(&str, shaderc::ShaderKind); 2] = [
        ("mesh.vert", shaderc::ShaderKind::Vertex),
        ("mesh.frag", shaderc::ShaderKind::Fragment),
    ];

    pub fn compile_all() {
        let out = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
        let compiler = shaderc::Compiler::new().expect("shaderc compiler");
        let mut opts = shaderc::CompileOptions::new().expect("shaderc options");
        opts.set_target_env(
            shaderc::TargetEnv::Vulkan,
            shaderc::EnvVersion::Vulkan1_0 as u32,
        );
        opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

        for (name, kind) in SHADERS {
            let path = PathBuf::from("shaders").join(name);
            println!("cargo:rerun-if-changed={}", path.display());
            let source = fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("reading {}: {e}", path.display()));
            let spirv = compiler
                .compile_into_spirv(&source, kind, name, "main", Some(&opts))
                .unwrap_or_else(|e| panic!("compiling {name}: {e}"));
            fs::write(out.join(format!("{name}.spv")), spirv.as_binary_u8())
                .unwrap_or_else(|e| panic!("writing {name}.spv: {e}"));
        }
    }
}
