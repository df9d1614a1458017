use crate::ndnp::layout::{file_name_str, issue_dir_date};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

fn walk_dirs(root: &Path) -> impl Iterator<Item = Result<walkdir::DirEntry>> + '_ {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(move |entry| {
            entry.with_context(|| format!("failed to walk {}", root.display()))
        })
        .filter(|entry| match entry {
            Ok(entry) => entry.file_type().is_dir(),
            Err(_) => true,
        })
}

/// Directories below `root` whose base name contains `needle`, depth-first.
pub fn find_by_substring(root: &Path, needle: &str) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in walk_dirs(root) {
        let entry = entry?;
        let Some(name) = file_name_str(entry.path()) else {
            continue;
        };
        debug!(dir = name, needle, "testing directory name");
        if name.contains(needle) {
            debug!(dir = %entry.path().display(), "matched");
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

/// Drop every match that has another match beneath it, so a batch directory
/// named after an LCCN yields to the LCCN directory it holds.
pub fn innermost(mut dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    dirs.sort();
    dirs.dedup();
    let keep: Vec<bool> = dirs
        .iter()
        .map(|dir| !dirs.iter().any(|other| other != dir && other.starts_with(dir)))
        .collect();
    dirs.into_iter()
        .zip(keep)
        .filter_map(|(dir, keep)| keep.then_some(dir))
        .collect()
}

/// Issue directories below `lccn_root` whose `YYYYMMDD` prefix lies within
/// `[start, end]` inclusive.
pub fn find_by_date_range(lccn_root: &Path, start: NaiveDate, end: NaiveDate) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in walk_dirs(lccn_root) {
        let entry = entry?;
        let Some(date) = file_name_str(entry.path()).and_then(issue_dir_date) else {
            continue;
        };
        if start <= date && date <= end {
            debug!(dir = %entry.path().display(), %start, %end, "directory within date window");
            out.push(entry.into_path());
        }
    }
    Ok(out)
}
