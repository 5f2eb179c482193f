use build_script_cfg::Cfg;
use find_cuda_helper::{find_cuda_root, include_cuda};
use std::{
    env,
    path::{Path, PathBuf},
};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let nvidia = Cfg::new("nvidia");
    if let Some(cuda_root) = find_cuda_root() {
        nvidia.define();
        include_cuda();
        bind_cublas(cuda_root)
    }
}

fn bind_cublas(toolkit: impl AsRef<Path>) {
    println!("cargo:rustc-link-lib=dylib=cublas");

    // Tell cargo to invalidate the built crate whenever the wrapper changes.
    println!("cargo:rerun-if-changed=wrapper.h");
    let include = toolkit.as_ref().join("include");

    let bindings = bindgen::Builder::default()
        .header("wrapper.h")
        .clang_arg(format!("-I{}", include.display()))
        .allowlist_function("cublas.*")
        .allowlist_item("cublas.*")
        .allowlist_item("cudaDataType.*")
        .must_use_type("cublasStatus_t")
        .default_enum_style(bindgen::EnumVariation::Rust {
            non_exhaustive: true,
        })
        .use_core()
        .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
        .generate()
        .expect("Unable to generate bindings");

    let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());
    bindings
        .write_to_file(out_path.join("bindings.rs"))
        .expect("Couldn't write bindings!");
}
