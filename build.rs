use anyhow::Result;
use chrono::TimeZone;
use std::env;
use std::fs;
use std::process::Command;
use vergen_gitcl::{Emitter, GitclBuilder};

fn main() -> Result<()> {
    let gitcl = GitclBuilder::default()
        .describe(true, true, Some("[0-9]*"))
        .build()?;

    let gitcl_res = Emitter::default()
        .idempotent()
        .fail_on_error()
        .add_instructions(&gitcl)
        .and_then(|emitter| emitter.emit());

    if let Err(e) = gitcl_res {
        eprintln!("error occurred while generating instructions: {e:?}");
        Emitter::default().idempotent().fail_on_error().emit()?;
    }

    let now = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|val| val.parse::<i64>().ok())
        .and_then(|secs| chrono::Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(chrono::Utc::now);

    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let engine_version = engine_version_from_metadata()
        .or_else(|_| engine_version_from_manifest())
        .unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=DACPLAY_VERSION={engine_version}");

    println!("cargo:rerun-if-changed=dacplay/Cargo.toml");

    Ok(())
}

/// Version of the `dacplay` package as resolved by cargo.
fn engine_version_from_metadata() -> Result<String> {
    let output = Command::new("cargo")
        .args(["metadata", "--format-version", "1", "--no-deps"])
        .output()?;

    if !output.status.success() {
        anyhow::bail!("cargo metadata failed");
    }

    let metadata: serde_json::Value = serde_json::from_slice(&output.stdout)?;

    metadata["packages"]
        .as_array()
        .into_iter()
        .flatten()
        .find(|package| package["name"].as_str() == Some("dacplay"))
        .and_then(|package| package["version"].as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("dacplay package not found in metadata"))
}

fn engine_version_from_manifest() -> Result<String> {
    let manifest = fs::read_to_string("dacplay/Cargo.toml")?;

    manifest
        .lines()
        .map(str::trim)
        .find_map(|line| {
            let value = line.strip_prefix("version")?.trim_start().strip_prefix('=')?;
            Some(value.trim().trim_matches('"').to_string())
        })
        .ok_or_else(|| anyhow::anyhow!("Could not find version in dacplay/Cargo.toml"))
}
