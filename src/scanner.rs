use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{OUTPUT_SUFFIX, RECORDING_EXTENSION};

/// Collect recording files under the given paths, sorted.
///
/// Plain files are taken as-is; directories are walked recursively for `*.json`.
/// Our own `*.swing.json` results are skipped so re-running a batch is harmless.
pub fn find_recordings(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();

    for path in paths {
        for entry in WalkDir::new(path).follow_links(true).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if is_recording(entry.path()) {
                found.push(entry.into_path());
            }
        }
    }

    found.sort();
    found.dedup();
    log::info!("Found {} recordings", found.len());
    found
}

fn is_recording(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    ext == RECORDING_EXTENSION && !name.ends_with(&format!(".{OUTPUT_SUFFIX}"))
}
