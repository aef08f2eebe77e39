//! Resident-set sampling through `/proc/<pid>/statm`.
//!
//! Only used for diagnostics; the generator never depends on it.

use std::fs;

use anyhow::{bail, Context};

use crate::page::system_page_size;

/// Resident bytes of this process.
pub fn resident_bytes() -> anyhow::Result<usize> {
    read_statm("/proc/self/statm")
}

/// Resident bytes of another process, e.g. a spawned generator.
pub fn resident_bytes_of(pid: u32) -> anyhow::Result<usize> {
    read_statm(&format!("/proc/{}/statm", pid))
}

fn read_statm(path: &str) -> anyhow::Result<usize> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
    let pages = parse_resident_pages(&raw).with_context(|| format!("malformed {}", path))?;
    Ok(pages * system_page_size())
}

// statm: size resident shared text lib data dt, all in pages
fn parse_resident_pages(statm: &str) -> anyhow::Result<usize> {
    let Some(field) = statm.split_whitespace().nth(1) else {
        bail!("missing resident field in {:?}", statm.trim());
    };
    field
        .parse()
        .with_context(|| format!("resident field {:?} is not a page count", field))
}
