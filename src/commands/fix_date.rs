use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::commands::{CommandReport, RepairSummary};
use crate::error::RepairError;
use crate::ndnp::batch_index::{IssueCorrection, batch_index_paths, update_batch_indexes};
use crate::ndnp::config::RepairConfig;
use crate::ndnp::correct::{DateCorrection, correct_date};
use crate::ndnp::fsops::files_in;
use crate::ndnp::layout::{IssueDate, IssueDir, batch_root_of, file_name_str, relative_tail, validate_lccn};
use crate::ndnp::locate::{find_by_substring, innermost};
use crate::ndnp::manifest::{Dialect, Manifest};
use crate::ndnp::rename::{date_rename_target, rename_date_token};

#[derive(Debug, Clone, Default)]
pub struct FixDateOptions {
    pub lccn: String,
    pub bad_date: String,
    pub new_date: String,
}

fn issue_xml_files(issue: &IssueDir) -> Result<Vec<(PathBuf, Dialect)>> {
    Ok(files_in(&issue.path)?
        .into_iter()
        .filter_map(|file| {
            let dialect = Dialect::of_issue_file(file_name_str(&file)?)?;
            Some((file, dialect))
        })
        .collect())
}

fn fix_issue(
    cfg: &RepairConfig,
    lccn: &str,
    bad: IssueDate,
    new: IssueDate,
    issue: &IssueDir,
    summary: &mut RepairSummary,
) -> Result<String> {
    let dry_run = cfg.dry_run;
    let manifests = &cfg.archive.batch_manifests;
    let bad_fd = bad.file_descriptor();
    let new_fd = new.file_descriptor();

    let batch_root = batch_root_of(&issue.path, lccn)?;
    let tail = relative_tail(&batch_root, &issue.path)?;
    batch_index_paths(&batch_root, manifests)?;
    let xml_files = issue_xml_files(issue)?;

    // Nothing is touched unless every rename has a free destination.
    let mut targets: Vec<PathBuf> = xml_files
        .iter()
        .filter(|(_, dialect)| *dialect == Dialect::IssueManifest)
        .filter_map(|(file, _)| date_rename_target(file, &bad_fd, &new_fd))
        .collect();
    targets.extend(date_rename_target(&issue.path, &bad_fd, &new_fd));
    if let Some(taken) = targets.iter().find(|target| target.exists()) {
        return Err(RepairError::conflict(taken, "rename destination already exists").into());
    }

    info!(issue = %tail, edition = issue.edition, dry_run, "fixing issue date");
    let fix = DateCorrection {
        bad,
        new,
        issue_tail: tail.clone(),
    };
    for (file, dialect) in &xml_files {
        let mut manifest = Manifest::load(file, *dialect)?;
        let changed = correct_date(&mut manifest, &fix)?;
        if changed == 0 {
            debug!(file = %file.display(), "no date fields to change");
            continue;
        }
        info!(file = %file.display(), fields = changed, dry_run, "fix date in file");
        if !dry_run {
            manifest.save(file)?;
        }
        summary.manifests_rewritten += 1;
    }

    for (file, dialect) in &xml_files {
        if *dialect == Dialect::IssueManifest
            && rename_date_token(file, &bad_fd, &new_fd, dry_run)?.is_some()
        {
            summary.files_renamed += 1;
        }
    }
    let renamed = rename_date_token(&issue.path, &bad_fd, &new_fd, dry_run)?;
    if renamed.is_some() {
        summary.files_renamed += 1;
    }

    info!(lccn = %issue.lccn, dry_run, "update dates in batch index");
    let outcome = update_batch_indexes(
        &batch_root,
        manifests,
        IssueCorrection::Date(&fix),
        None,
        dry_run,
    )?;
    summary.record_batch(&outcome);
    summary.issues_processed += 1;

    let new_tail = match renamed {
        Some(path) => relative_tail(&batch_root, &path)?,
        None => tail.clone(),
    };
    Ok(format!("{tail} -> {new_tail}"))
}

pub fn run(cfg: &RepairConfig, opts: &FixDateOptions) -> Result<CommandReport> {
    let lccn = validate_lccn(&opts.lccn)?;
    let bad = IssueDate::parse(&opts.bad_date)?;
    let new = IssueDate::parse(&opts.new_date)?;
    if bad == new {
        return Err(RepairError::InvalidInput(format!(
            "bad date and new date are both {}",
            bad.human()
        ))
        .into());
    }

    let mut report = CommandReport::new("fix-date", cfg.dry_run);
    let root = &cfg.archive.search_root;
    info!(search_root = %root.display(), %lccn, "searching");
    let lccn_dirs = innermost(find_by_substring(root, &lccn)?);
    if lccn_dirs.is_empty() {
        return Err(RepairError::NotFound(format!(
            "no directories identified by LCCN {lccn} under {}",
            root.display()
        ))
        .into());
    }

    let bad_fd = bad.file_descriptor();
    let mut issues = Vec::new();
    for dir in &lccn_dirs {
        info!(dir = %dir.display(), bad_date = %bad.human(), "search for bad dates");
        let found: Vec<IssueDir> = find_by_substring(dir, &bad_fd)?
            .iter()
            .filter_map(|path| IssueDir::from_path(&lccn, path))
            // The token can straddle date and edition (`1919110119` holds `19110119`).
            .filter(|issue| issue.date == bad.date())
            .collect();
        if found.is_empty() {
            return Err(RepairError::NotFound(format!(
                "no issue directories dated {} in {}",
                bad.human(),
                dir.display()
            ))
            .into());
        }
        issues.extend(found);
    }

    for issue in &issues {
        match fix_issue(cfg, &lccn, bad, new, issue, &mut report.summary) {
            Ok(line) => report.detail(line),
            Err(err) => {
                warn!(summary = %report.summary, "stopping; issues already fixed stay fixed");
                return Err(err.context(format!("failed to fix date of {}", issue.path.display())));
            }
        }
    }

    info!(summary = %report.summary, dry_run = cfg.dry_run, "date fix complete");
    Ok(report)
}
