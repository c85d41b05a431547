fn main() {
    println!("cargo:rerun-if-env-changed=TYPEFLOW_VERSION");

    if option_env!("TYPEFLOW_VERSION").is_none() {
        println!("cargo:rustc-env=TYPEFLOW_VERSION={}", env!("CARGO_PKG_VERSION"));
    }
}
