use crate::error::RepairError;
use crate::ndnp::fsops::{copy_file, file_hash, files_in, subdirectory_names};
use crate::ndnp::layout::{ReelLocation, file_name_str};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// A reel as referenced from a batch index: `<lccn>/<reel number>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReelRef {
    pub lccn: String,
    pub reel_number: String,
}

impl ReelRef {
    fn of(location: &ReelLocation) -> Self {
        Self {
            lccn: file_name_str(&location.lccn_dir).unwrap_or_default().to_string(),
            reel_number: location.reel_number.clone(),
        }
    }

    /// `sn87654321/00271763289`, matched as a substring of reel entries.
    pub fn tail(&self) -> String {
        format!("{}/{}", self.lccn, self.reel_number)
    }

    /// `sn87654321/00271763289/00271763289.xml`, the text of a reel entry.
    pub fn manifest_tail(&self) -> String {
        format!("{}/{}/{}.xml", self.lccn, self.reel_number, self.reel_number)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReelMigration {
    pub copied: Option<ReelRef>,
    pub deleted: Option<ReelRef>,
    pub files_copied: usize,
    pub lccn_dir_removed: bool,
}

fn plan_copies(from: &Path, to: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut copies = Vec::new();
    for source in files_in(from)? {
        let Some(name) = source.file_name() else {
            continue;
        };
        let dest = to.join(name);
        if dest.exists() {
            if file_hash(&source)? != file_hash(&dest)? {
                return Err(RepairError::conflict(
                    &dest,
                    format!("differs from reel file {}", source.display()),
                )
                .into());
            }
            continue;
        }
        copies.push((source, dest));
    }
    Ok(copies)
}

/// Bring reel assets along after an issue moved from `old_issue` to
/// `new_issue`, and delete the old reel (and its LCCN directory) once no
/// issue directories remain under it.
pub fn migrate_reel(old_issue: &Path, new_issue: &Path, dry_run: bool) -> Result<ReelMigration> {
    let old = ReelLocation::of_issue(old_issue)?;
    let new = ReelLocation::of_issue(new_issue)?;
    let mut out = ReelMigration::default();
    if old.reel_dir == new.reel_dir {
        return Ok(out);
    }

    if !new.manifest_path().exists() {
        let copied = ReelRef::of(&new);
        info!(from = %ReelRef::of(&old).tail(), to = %copied.tail(), dry_run, "copy reel files");
        if old.reel_dir.is_dir() {
            let copies = plan_copies(&old.reel_dir, &new.reel_dir)?;
            if !dry_run {
                fs::create_dir_all(&new.reel_dir)
                    .with_context(|| format!("failed to create {}", new.reel_dir.display()))?;
                for (source, dest) in &copies {
                    copy_file(source, dest)?;
                }
            }
            out.files_copied = copies.len();
        }
        out.copied = Some(copied);
    }

    let issue_name = file_name_str(old_issue).unwrap_or_default();
    let reel_emptied = if old.reel_dir.exists() {
        // In a dry run the issue has not actually left the reel yet.
        let remaining: Vec<_> = subdirectory_names(&old.reel_dir)?
            .into_iter()
            .filter(|name| name != issue_name)
            .collect();
        if remaining.is_empty() {
            info!(reel = %ReelRef::of(&old).tail(), dry_run, "delete reel files no longer needed");
            if !dry_run {
                fs::remove_dir_all(&old.reel_dir)
                    .with_context(|| format!("failed to remove {}", old.reel_dir.display()))?;
            }
        }
        remaining.is_empty()
    } else {
        // Already pruned as empty when the issue moved out.
        true
    };
    if !reel_emptied {
        return Ok(out);
    }
    out.deleted = Some(ReelRef::of(&old));

    if old.lccn_dir.exists() {
        let other_reels: Vec<_> = subdirectory_names(&old.lccn_dir)?
            .into_iter()
            .filter(|name| *name != old.reel_number)
            .collect();
        if other_reels.is_empty() {
            info!(dir = %old.lccn_dir.display(), dry_run, "delete emptied containing lccn directory");
            if !dry_run {
                fs::remove_dir_all(&old.lccn_dir)
                    .with_context(|| format!("failed to remove {}", old.lccn_dir.display()))?;
            }
            out.lccn_dir_removed = true;
        }
    } else {
        out.lccn_dir_removed = true;
    }

    Ok(out)
}
