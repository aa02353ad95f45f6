//! Build script for muon-boot-prom: wires up the linker script.

fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    let target = std::env::var("TARGET").unwrap_or_default();

    // Only the bare-metal targets use the custom layout; native builds are
    // for `cargo check` convenience and get no script.
    if !target.starts_with("mips") && !target.starts_with("powerpc") {
        return;
    }

    let script = std::path::Path::new(&manifest_dir).join("loader.ld");
    println!("cargo:rustc-link-arg-bins=-T{}", script.display());
    println!("cargo:rerun-if-changed={}", script.display());
}
