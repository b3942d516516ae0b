fn main() {
    println!("cargo:rerun-if-changed=version_scripts/libc.map");
    // Debug builds export nothing under C names, so the script would name
    // undefined symbols.
    if std::env::var("PROFILE").as_deref() != Ok("release") {
        return;
    }
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_owned());
    let version_script = format!("{manifest_dir}/version_scripts/libc.map");
    if std::path::Path::new(&version_script).exists() {
        println!("cargo:rustc-cdylib-link-arg=-Wl,--version-script={version_script}");
    }
}
