//! Build script for spurge.
//!
//! Copies the `.env.example` template into the local data directory, next to
//! where `spurge` looks for its `.env`:
//! - Linux: `~/.local/share/spurge/.env.example`
//! - macOS: `~/Library/Application Support/spurge/.env.example`
//! - Windows: `%LOCALAPPDATA%/spurge/.env.example`
//!
//! A missing template only produces a cargo warning.

use std::{env, fs, path::PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=.env.example");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let env_example_path = manifest_dir.join(".env.example");

    let mut out_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    out_dir.push("spurge");

    if env_example_path.is_file() {
        // Best effort: the data directory may be read-only.
        if let Err(e) = fs::create_dir_all(&out_dir)
            .and_then(|_| fs::copy(&env_example_path, out_dir.join(".env.example")))
        {
            println!("cargo:warning=cannot copy .env.example: {}", e);
        }
    } else {
        println!(
            "cargo:warning=.env.example not found at {}",
            env_example_path.display()
        );
    }

    Ok(())
}
