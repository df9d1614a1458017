//! Keeps `batch.xml` / `batch_1.xml` pointing at the corrected issues and
//! reels.
//!
//! Reel entries follow the issue entries and stay sorted by
//! `(reel number, numeric LCCN)`.

use crate::error::RepairError;
use crate::ndnp::correct::{DateCorrection, LccnCorrection, correct_date, correct_lccn};
use crate::ndnp::layout::lccn_numeric;
use crate::ndnp::manifest::{Dialect, Manifest, NDNP_NS};
use crate::ndnp::reel::{ReelMigration, ReelRef};
use crate::ndnp::xml::{Document, Element, Node};
use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DEFAULT_INDENT: &str = "\n\t";

#[derive(Debug, Clone, Copy)]
pub enum IssueCorrection<'a> {
    Date(&'a DateCorrection),
    Lccn(&'a LccnCorrection),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchIndexOutcome {
    pub files_rewritten: usize,
    pub issue_fields: usize,
    pub reels_added: usize,
    pub reels_removed: usize,
}

/// Existing batch index files under `batch_root`. The first configured name
/// is required, the rest are optional.
pub fn batch_index_paths(batch_root: &Path, names: &[String]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let path = batch_root.join(name);
        if path.is_file() {
            out.push(path);
        } else if i == 0 {
            return Err(RepairError::NotFound(format!(
                "batch index {} does not exist",
                path.display()
            ))
            .into());
        } else {
            debug!(path = %path.display(), "optional batch index absent");
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Issue,
    Reel,
}

#[derive(Debug)]
struct Entry {
    index: usize,
    kind: EntryKind,
    text: String,
    sort_key: Option<(u64, Option<u64>)>,
}

/// `(reel number, numeric LCCN)` of a reel entry, taken from `reelNumber`
/// when present and from the `<lccn>/<reel>/...` path otherwise.
fn reel_sort_key(el: &Element, text: &str) -> Option<(u64, Option<u64>)> {
    let mut parts = text.trim().split('/');
    let lccn = parts.next().and_then(lccn_numeric);
    let number = el
        .attr("reelNumber")
        .or_else(|| parts.next().map(str::to_string))?
        .trim()
        .parse()
        .ok()?;
    Some((number, lccn))
}

fn entries(doc: &Document) -> Vec<Entry> {
    let Some(root) = doc.root() else {
        return Vec::new();
    };
    let mut scope = doc.root_scope();
    let mut out = Vec::new();
    for (index, child) in root.children.iter().enumerate() {
        let Node::Element(el) = child else {
            continue;
        };
        scope.push(el);
        let kind = if scope.is(el, NDNP_NS, "issue") {
            Some(EntryKind::Issue)
        } else if scope.is(el, NDNP_NS, "reel") {
            Some(EntryKind::Reel)
        } else {
            None
        };
        scope.pop();
        if let Some(kind) = kind {
            let text = el.text().unwrap_or_default();
            let sort_key = match kind {
                EntryKind::Reel => reel_sort_key(el, &text),
                EntryKind::Issue => None,
            };
            out.push(Entry {
                index,
                kind,
                text,
                sort_key,
            });
        }
    }
    out
}

fn preceding_indent(children: &[Node], index: usize) -> String {
    match index.checked_sub(1).and_then(|i| children.get(i)) {
        Some(Node::Text(raw)) if raw.trim().is_empty() => raw.clone(),
        _ => DEFAULT_INDENT.to_string(),
    }
}

fn entry_name(root: &Element, local: &str) -> String {
    let prefix = root
        .children
        .iter()
        .find_map(|child| match child {
            Node::Element(el) if matches!(el.local_name(), "issue" | "reel") => Some(el.prefix()),
            _ => None,
        })
        .flatten();
    match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

/// Add a reel entry in sorted position. Returns false when an entry for the
/// reel already exists.
pub fn insert_reel(doc: &mut Document, reel: &ReelRef) -> bool {
    let entries = entries(doc);
    let tail = reel.tail();
    if entries
        .iter()
        .any(|e| e.kind == EntryKind::Reel && e.text.contains(&tail))
    {
        return false;
    }

    let number: u64 = reel.reel_number.parse().unwrap_or(u64::MAX);
    let key = (number, lccn_numeric(&reel.lccn));
    let before = entries
        .iter()
        .filter(|e| e.kind == EntryKind::Reel)
        .find(|e| e.sort_key.is_some_and(|entry_key| key < entry_key))
        .map(|e| e.index);
    let after = entries
        .iter()
        .rev()
        .find(|e| e.kind == EntryKind::Reel)
        .or_else(|| entries.last())
        .map(|e| e.index);

    let Some(root) = doc.root_mut() else {
        return false;
    };
    let mut element = Element::new(entry_name(root, "reel"));
    element.set_attr("reelNumber", &reel.reel_number);
    element.set_text(&reel.manifest_tail());

    match (before, after) {
        (Some(index), _) => {
            let indent = preceding_indent(&root.children, index);
            root.children.insert(index, Node::Element(element));
            root.children.insert(index + 1, Node::Text(indent));
        }
        (None, Some(index)) => {
            let indent = preceding_indent(&root.children, index);
            root.children.insert(index + 1, Node::Text(indent));
            root.children.insert(index + 2, Node::Element(element));
        }
        (None, None) => {
            let at = match root.children.last() {
                Some(node) if node.is_whitespace() => root.children.len() - 1,
                _ => root.children.len(),
            };
            root.children.insert(at, Node::Text(DEFAULT_INDENT.to_string()));
            root.children.insert(at + 1, Node::Element(element));
        }
    }
    true
}

/// Drop the first reel entry referencing `reel`, with its leading
/// whitespace. Returns false when there was none.
pub fn remove_reel(doc: &mut Document, reel: &ReelRef) -> bool {
    let tail = reel.tail();
    let Some(index) = entries(doc)
        .into_iter()
        .find(|e| e.kind == EntryKind::Reel && e.text.contains(&tail))
        .map(|e| e.index)
    else {
        return false;
    };
    let Some(root) = doc.root_mut() else {
        return false;
    };
    root.children.remove(index);
    if index > 0 && root.children[index - 1].is_whitespace() {
        root.children.remove(index - 1);
    }
    true
}

/// Apply an issue correction and any reel changes to every batch index of
/// the batch, rewriting each file that changed.
pub fn update_batch_indexes(
    batch_root: &Path,
    names: &[String],
    correction: IssueCorrection<'_>,
    reels: Option<&ReelMigration>,
    dry_run: bool,
) -> Result<BatchIndexOutcome> {
    let mut out = BatchIndexOutcome::default();
    for path in batch_index_paths(batch_root, names)? {
        let mut manifest = Manifest::load(&path, Dialect::BatchIndex)?;
        let issue_fields = match correction {
            IssueCorrection::Date(fix) => correct_date(&mut manifest, fix)?,
            IssueCorrection::Lccn(fix) => correct_lccn(&mut manifest, fix)?,
        };
        if issue_fields > 0 {
            info!(file = %path.display(), fields = issue_fields, dry_run, "updated issue entry in batch index");
        }
        let mut changed = issue_fields;

        if let Some(reels) = reels {
            if let Some(copied) = &reels.copied {
                if insert_reel(&mut manifest.document, copied) {
                    info!(file = %path.display(), reel = %copied.tail(), dry_run, "adding copied reel to batch index");
                    out.reels_added += 1;
                    changed += 1;
                } else {
                    debug!(file = %path.display(), reel = %copied.tail(), "copied reel already in batch index");
                }
            }
            if let Some(deleted) = &reels.deleted {
                if remove_reel(&mut manifest.document, deleted) {
                    info!(file = %path.display(), reel = %deleted.tail(), dry_run, "removing deleted reel from batch index");
                    out.reels_removed += 1;
                    changed += 1;
                }
            }
        }

        out.issue_fields += issue_fields;
        if changed > 0 {
            if !dry_run {
                manifest.save(&path)?;
            }
            out.files_rewritten += 1;
        }
    }
    Ok(out)
}
