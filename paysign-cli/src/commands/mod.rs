//! CLI command implementations

pub mod decrypt;
pub mod inspect;
pub mod sign;
pub mod verify;

use anyhow::{Context, Result};
use std::path::Path;

/// Read a file, or stdin when the path is `-`.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        use std::io::Read;
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Read a UTF-8 text file.
pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
