use anyhow::Result;
use tracing::{debug, info, warn};

use crate::commands::CommandReport;
use crate::error::RepairError;
use crate::ndnp::batch_index::{IssueCorrection, batch_index_paths, update_batch_indexes};
use crate::ndnp::config::RepairConfig;
use crate::ndnp::correct::{LccnCorrection, correct_lccn};
use crate::ndnp::fsops::files_in;
use crate::ndnp::layout::{
    IssueDate, IssueDir, ReelLocation, batch_root_of, file_name_str, relative_tail, validate_lccn,
};
use crate::ndnp::locate::{find_by_date_range, find_by_substring, innermost};
use crate::ndnp::manifest::{Dialect, Manifest};
use crate::ndnp::reel::migrate_reel;
use crate::ndnp::rename::{relocate_issue, relocation_target};

#[derive(Debug, Clone, Default)]
pub struct FixLccnOptions {
    pub bad_lccn: String,
    pub correct_lccn: String,
    pub start_date: String,
    pub end_date: String,
}

struct LccnFix {
    bad: String,
    correct: String,
}

fn fix_issue(
    cfg: &RepairConfig,
    lccns: &LccnFix,
    issue: &IssueDir,
    report: &mut CommandReport,
) -> Result<String> {
    let dry_run = cfg.dry_run;
    let manifests = &cfg.archive.batch_manifests;
    let path = &issue.path;

    let batch_root = batch_root_of(path, &lccns.bad)?;
    let tail = relative_tail(&batch_root, path)?;
    batch_index_paths(&batch_root, manifests)?;
    let target = relocation_target(path, &batch_root, &lccns.bad, &lccns.correct)?;
    // Issues filed straight under the LCCN directory have no reel to carry.
    let on_reel = ReelLocation::of_issue(path).is_ok();
    if on_reel {
        ReelLocation::of_issue(&target)?;
    }
    if target != *path && target.exists() {
        return Err(RepairError::conflict(&target, "relocation destination already exists").into());
    }

    info!(issue = %tail, date = %issue.date, dry_run, "fix affected issue");
    let fix = LccnCorrection {
        bad_lccn: lccns.bad.clone(),
        correct_lccn: lccns.correct.clone(),
        issue_tail: tail.clone(),
    };
    for file in files_in(path)? {
        // Page manifests carry no LCCN.
        let Some(Dialect::IssueManifest) = file_name_str(&file).and_then(Dialect::of_issue_file)
        else {
            continue;
        };
        let mut manifest = Manifest::load(&file, Dialect::IssueManifest)?;
        let changed = correct_lccn(&mut manifest, &fix)?;
        if changed == 0 {
            debug!(file = %file.display(), "identifier already correct");
            continue;
        }
        info!(file = %file.display(), lccn = %lccns.correct, dry_run, "fix lccn in file");
        if !dry_run {
            manifest.save(&file)?;
        }
        report.summary.manifests_rewritten += 1;
    }

    let moved = relocate_issue(path, &batch_root, &lccns.bad, &lccns.correct, dry_run)?;
    if moved != *path {
        report.summary.directories_relocated += 1;
    }

    let reels = if on_reel {
        let reels = migrate_reel(path, &moved, dry_run)?;
        if reels.files_copied > 0 {
            debug!(files = reels.files_copied, dry_run, "reel files copied");
        }
        report.summary.record_reels(&reels);
        Some(reels)
    } else {
        let note = format!("{tail} is not inside a reel directory; reel files left alone");
        info!("{note}");
        report.issue(note);
        None
    };

    info!(lccn = %lccns.correct, dry_run, "update lccn in batch index");
    let outcome = update_batch_indexes(
        &batch_root,
        manifests,
        IssueCorrection::Lccn(&fix),
        reels.as_ref(),
        dry_run,
    )?;
    report.summary.record_batch(&outcome);
    report.summary.issues_processed += 1;

    Ok(format!("{tail} -> {}", relative_tail(&batch_root, &moved)?))
}

pub fn run(cfg: &RepairConfig, opts: &FixLccnOptions) -> Result<CommandReport> {
    let lccns = LccnFix {
        bad: validate_lccn(&opts.bad_lccn)?,
        correct: validate_lccn(&opts.correct_lccn)?,
    };
    if lccns.bad == lccns.correct {
        return Err(RepairError::InvalidInput(format!(
            "bad and correct LCCN are both {}",
            lccns.bad
        ))
        .into());
    }
    let start = IssueDate::parse(&opts.start_date)?;
    let end = IssueDate::parse(&opts.end_date)?;
    if start > end {
        return Err(RepairError::InvalidInput(format!(
            "start date {} is after end date {}",
            start.human(),
            end.human()
        ))
        .into());
    }

    let mut report = CommandReport::new("fix-lccn", cfg.dry_run);
    let root = &cfg.archive.search_root;
    info!(search_root = %root.display(), bad_lccn = %lccns.bad, "searching for bad lccn");
    let lccn_dirs = innermost(find_by_substring(root, &lccns.bad)?);
    if lccn_dirs.is_empty() {
        return Err(RepairError::NotFound(format!(
            "no directories identified by LCCN {} under {}",
            lccns.bad,
            root.display()
        ))
        .into());
    }

    let mut issues = Vec::new();
    for dir in &lccn_dirs {
        info!(dir = %dir.display(), "search for affected issues");
        let found: Vec<IssueDir> = find_by_date_range(dir, start.date(), end.date())?
            .iter()
            .filter_map(|path| IssueDir::from_path(&lccns.bad, path))
            .collect();
        if found.is_empty() {
            let note = format!(
                "no issues between {} and {} in {}",
                start.human(),
                end.human(),
                dir.display()
            );
            info!("{note}");
            report.issue(note);
        }
        issues.extend(found);
    }

    for issue in &issues {
        match fix_issue(cfg, &lccns, issue, &mut report) {
            Ok(line) => report.detail(line),
            Err(err) => {
                warn!(summary = %report.summary, "stopping; issues already fixed stay fixed");
                return Err(err.context(format!("failed to fix lccn of {}", issue.path.display())));
            }
        }
    }

    info!(summary = %report.summary, dry_run = cfg.dry_run, "lccn fix complete");
    Ok(report)
}
