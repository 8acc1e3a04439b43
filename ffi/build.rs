//! Generates `include/reqlife.h` from the `extern "C"` surface.

use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-changed=build.rs");

    let crate_dir =
        PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()));
    let out_dir = crate_dir.join("include");
    if let Err(err) = std::fs::create_dir_all(&out_dir) {
        println!("cargo:warning=cannot create {}: {err}", out_dir.display());
        return;
    }

    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("REQLIFE_H")
        .with_no_includes()
        .with_sys_include("stdbool.h")
        .with_sys_include("stdint.h")
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(out_dir.join("reqlife.h"));
        }
        Err(err) => println!("cargo:warning=C header not generated: {err}"),
    }
}
