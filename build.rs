// build.rs

use chrono::Utc;
use std::env;
use std::fs;
use std::path::Path;

fn main() {
    let out_dir = env::var("OUT_DIR").expect("cargo sets OUT_DIR for build scripts");
    let dest_path = Path::new(&out_dir).join("build_info.rs");

    // stamped once per build, logged at start-up
    let build_date = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();

    fs::write(
        &dest_path,
        format!(
            "pub const BUILD_DATE: &str = \"{}\";\npub const BUILD_PROFILE: &str = \"{}\";\n",
            build_date,
            env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string()),
        ),
    )
    .expect("failed to write build_info.rs");

    println!("cargo:rerun-if-changed=build.rs");
}
