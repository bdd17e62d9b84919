use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/types.rs");

    let Ok(crate_dir) = env::var("CARGO_MANIFEST_DIR") else {
        return;
    };
    let output = PathBuf::from(&crate_dir).join("include").join("unifetch.h");
    if let Some(dir) = output.parent() {
        if let Err(e) = std::fs::create_dir_all(dir) {
            println!("cargo:warning=cannot create include dir: {e}");
            return;
        }
    }

    // Header generation failures are reported as warnings.
    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("UNIFETCH_H")
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(output);
        }
        Err(e) => println!("cargo:warning=cbindgen failed: {e}"),
    }
}
