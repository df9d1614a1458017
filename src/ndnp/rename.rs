use crate::error::RepairError;
use crate::ndnp::fsops::{move_dir, prune_empty_ancestors};
use crate::ndnp::layout::{file_name_str, relative_tail};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Destination of renaming `path` with `bad_token` replaced by `new_token` in
/// its final component, or `None` when the token is absent.
pub fn date_rename_target(path: &Path, bad_token: &str, new_token: &str) -> Option<PathBuf> {
    let name = file_name_str(path)?;
    if !name.contains(bad_token) {
        return None;
    }
    Some(path.with_file_name(name.replace(bad_token, new_token)))
}

pub fn rename_date_token(
    path: &Path,
    bad_token: &str,
    new_token: &str,
    dry_run: bool,
) -> Result<Option<PathBuf>> {
    let Some(target) = date_rename_target(path, bad_token, new_token) else {
        return Ok(None);
    };
    if target.exists() {
        return Err(RepairError::conflict(&target, format!("rename of {} would replace it", path.display())).into());
    }

    info!(
        from = %path.display(),
        to = %target.display(),
        dry_run,
        "replace {bad_token} in name with {new_token}"
    );
    if !dry_run {
        fs::rename(path, &target).with_context(|| {
            format!("failed to rename {} to {}", path.display(), target.display())
        })?;
    }
    Ok(Some(target))
}

/// Destination of an issue directory once `bad_lccn` is replaced below `batch_root`.
pub fn relocation_target(
    issue_path: &Path,
    batch_root: &Path,
    bad_lccn: &str,
    correct_lccn: &str,
) -> Result<PathBuf> {
    let tail = relative_tail(batch_root, issue_path)?;
    Ok(batch_root.join(tail.replace(bad_lccn, correct_lccn)))
}

/// Move an issue directory tree to the path with the corrected LCCN, then
/// drop ancestors left empty behind it.
pub fn relocate_issue(
    issue_path: &Path,
    batch_root: &Path,
    bad_lccn: &str,
    correct_lccn: &str,
    dry_run: bool,
) -> Result<PathBuf> {
    let target = relocation_target(issue_path, batch_root, bad_lccn, correct_lccn)?;
    if target == issue_path {
        return Ok(target);
    }
    if target.exists() {
        return Err(RepairError::conflict(
            &target,
            format!("relocation of {} would merge into it", issue_path.display()),
        )
        .into());
    }

    info!(
        from = %issue_path.display(),
        to = %target.display(),
        dry_run,
        "move {bad_lccn} to {correct_lccn}"
    );
    if dry_run {
        return Ok(target);
    }

    move_dir(issue_path, &target)?;
    if let Some(parent) = issue_path.parent() {
        for removed in prune_empty_ancestors(parent, batch_root)? {
            info!(dir = %removed.display(), "removed emptied directory");
        }
    }
    Ok(target)
}
