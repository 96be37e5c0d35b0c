use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// First `*.pdf` (any case) in `dir`, in directory-listing order. Not recursive.
pub fn find_first_pdf(dir: &Path) -> Result<Option<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list directory: {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list directory: {}", dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_pdf_name(name) {
            continue;
        }
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            debug!("Skipping directory {}", name);
            continue;
        }
        return Ok(Some(entry.path()));
    }
    Ok(None)
}

fn is_pdf_name(name: &str) -> bool {
    name.to_lowercase().ends_with(".pdf")
}
