pub mod fix_date;
pub mod fix_lccn;

use crate::ndnp::batch_index::BatchIndexOutcome;
use crate::ndnp::reel::ReelMigration;
use serde::Serialize;
use std::fmt;

/// Counters for one repair run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairSummary {
    pub issues_processed: usize,
    pub manifests_rewritten: usize,
    pub files_renamed: usize,
    pub directories_relocated: usize,
    pub reels_copied: usize,
    pub reels_deleted: usize,
    pub lccn_dirs_removed: usize,
    pub batch_indexes_rewritten: usize,
    pub batch_entries_updated: usize,
}

impl RepairSummary {
    pub fn record_batch(&mut self, outcome: &BatchIndexOutcome) {
        self.batch_indexes_rewritten += outcome.files_rewritten;
        self.batch_entries_updated +=
            outcome.issue_fields + outcome.reels_added + outcome.reels_removed;
    }

    pub fn record_reels(&mut self, migration: &ReelMigration) {
        self.reels_copied += usize::from(migration.copied.is_some());
        self.reels_deleted += usize::from(migration.deleted.is_some());
        self.lccn_dirs_removed += usize::from(migration.lccn_dir_removed);
    }
}

impl fmt::Display for RepairSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "issues={} manifests={} renamed={} relocated={} reels_copied={} reels_deleted={} lccn_dirs_removed={} batch_indexes={} batch_entries={}",
            self.issues_processed,
            self.manifests_rewritten,
            self.files_renamed,
            self.directories_relocated,
            self.reels_copied,
            self.reels_deleted,
            self.lccn_dirs_removed,
            self.batch_indexes_rewritten,
            self.batch_entries_updated,
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub dry_run: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
    pub summary: RepairSummary,
}

impl CommandReport {
    pub fn new(command: impl Into<String>, dry_run: bool) -> Self {
        Self {
            command: command.into(),
            ok: true,
            dry_run,
            details: Vec::new(),
            issues: Vec::new(),
            summary: RepairSummary::default(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    /// Advisory finding; leaves the run successful.
    pub fn issue(&mut self, text: impl Into<String>) {
        self.issues.push(text.into());
    }

    pub fn render_text(&self) -> String {
        let mut out = format!(
            "{}: {}{}\n",
            self.command,
            if self.ok { "ok" } else { "failed" },
            if self.dry_run { " (dry run)" } else { "" }
        );
        for line in &self.details {
            out.push_str(&format!("  {line}\n"));
        }
        for line in &self.issues {
            out.push_str(&format!("  note: {line}\n"));
        }
        out.push_str(&format!("  summary: {}\n", self.summary));
        out
    }
}
