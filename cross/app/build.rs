//! Copies `memory.x` into a directory on the linker search path and passes
//! the RP2040 linker scripts.
use std::{env, fs::File, io::Write, path::PathBuf};

use anyhow::{Context, Result};

fn main() -> Result<()> {
    let out = PathBuf::from(env::var_os("OUT_DIR").context("OUT_DIR not set")?);
    File::create(out.join("memory.x"))
        .context("failed to create memory.x")?
        .write_all(include_bytes!("memory.x"))
        .context("failed to write memory.x")?;
    println!("cargo:rustc-link-search={}", out.display());
    println!("cargo:rerun-if-changed=memory.x");

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    Ok(())
}
