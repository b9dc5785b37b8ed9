//! Script discovery for a harness's mode directory.

use std::fs;
use std::io;

use crate::harness::{Harness, HarnessError, HarnessResult};

/// Names of the scripts in `<scripts_root>/<mode dir>`, sorted.
///
/// Hidden files and subdirectories are skipped. A missing mode directory is not an error: it simply has no scripts.
pub fn discover_scripts(harness: &Harness) -> HarnessResult<Vec<String>> {
    let dir = harness.config().script_dir();

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("No script directory at {}", dir.display());
            return Ok(Vec::new());
        }
        Err(source) => return Err(HarnessError::Discovery { path: dir, source }),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| HarnessError::Discovery {
            path: dir.clone(),
            source,
        })?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_file && !name.starts_with('.') {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}

/// Keep only the scripts whose name contains `keyword`.
pub fn filter_scripts(names: Vec<String>, keyword: Option<&str>) -> Vec<String> {
    match keyword {
        Some(keyword) => names.into_iter().filter(|n| n.contains(keyword)).collect(),
        None => names,
    }
}
