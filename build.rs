fn main() {
    // Keep `check-cfg` happy even when we skip `tauri_build::build()` (headless core builds).
    println!("cargo:rustc-check-cfg=cfg(desktop)");
    println!("cargo:rustc-check-cfg=cfg(mobile)");

    // `tauri_build::build()` reads tauri.conf.json and env vars exported by the `tauri` crate
    // (e.g. `DEP_TAURI_DEV`). Without the `app` feature the runtime stack is not compiled,
    // so the build helpers are skipped.
    if std::env::var_os("CARGO_FEATURE_APP").is_some() {
        tauri_build::build()
    }
}
