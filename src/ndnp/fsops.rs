use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn file_hash(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Copy a file and carry its modification time over to the copy.
pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)
        .with_context(|| format!("failed to copy {} to {}", from.display(), to.display()))?;
    let modified = fs::metadata(from)
        .and_then(|meta| meta.modified())
        .with_context(|| format!("failed to read modification time of {}", from.display()))?;
    fs::File::options()
        .write(true)
        .open(to)
        .and_then(|file| file.set_modified(modified))
        .with_context(|| format!("failed to set modification time of {}", to.display()))?;
    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry.with_context(|| format!("failed to walk {}", from.display()))?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .with_context(|| format!("{} escaped {}", entry.path().display(), from.display()))?;
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("failed to create {}", target.display()))?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Move a directory tree, creating missing parents of `to`. Falls back to
/// copy-then-delete when `rename` cannot cross filesystems.
pub fn move_dir(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    match fs::rename(from, to) {
        Ok(_) => Ok(()),
        Err(rename_err) if rename_err.kind() == ErrorKind::CrossesDevices => {
            copy_tree(from, to)?;
            fs::remove_dir_all(from)
                .with_context(|| format!("failed to remove {}", from.display()))?;
            Ok(())
        }
        Err(rename_err) => Err(rename_err)
            .with_context(|| format!("failed to move {} to {}", from.display(), to.display())),
    }
}

/// Remove `start` and its ancestors while they are empty, never touching
/// `stop` or anything above it. Returns the directories removed.
pub fn prune_empty_ancestors(start: &Path, stop: &Path) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) || !dir.is_dir() {
            break;
        }
        let mut entries =
            fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
        if entries.next().is_some() {
            break;
        }
        fs::remove_dir(dir).with_context(|| format!("failed to remove {}", dir.display()))?;
        removed.push(dir.to_path_buf());
        current = dir.parent();
    }
    Ok(removed)
}

/// Names of the immediate subdirectories of `dir`, sorted.
pub fn subdirectory_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Regular files directly inside `dir`, sorted by name.
pub fn files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
