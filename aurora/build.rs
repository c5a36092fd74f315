use std::io::prelude::*;
use std::{env, error::Error, fs, fs::File, path::Path};

// Specify the correct GLSL version in the shaders at build time.
fn main() -> Result<(), Box<dyn Error>> {
    let out_dir = env::var_os("OUT_DIR").ok_or("missing output directory")?;
    let target = env::var("TARGET")?;

    // WebGL2 only understands GLSL ES 3.00. Desktop hosts create a 3.3 core
    // context.
    let version = match target.as_str() {
        "wasm32-unknown-unknown" => "300 es",
        _ => "330 core",
    };

    println!("cargo:rerun-if-changed=shaders");

    let shader_dir = Path::new(&out_dir).join("shaders");
    fs::create_dir_all(&shader_dir)?;

    for entry in fs::read_dir("shaders")? {
        let path = entry?.path();
        let file_name = path.file_name().ok_or("shader path without a file name")?;

        let mut version_shader_source = format!("#version {}\n", version);
        File::open(&path)?.read_to_string(&mut version_shader_source)?;

        fs::write(shader_dir.join(file_name), version_shader_source.as_bytes())?;
    }

    Ok(())
}
