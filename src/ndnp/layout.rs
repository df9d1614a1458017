//! Naming rules of the batch archive tree:
//! `search_root/<batch>/<lccn>/<reel>/<YYYYMMDDEE>/...`.

use crate::error::RepairError;
use anyhow::Result;
use chrono::NaiveDate;
use std::path::{Component, Path, PathBuf};

pub const ISSUE_DIR_NAME_LEN: usize = 10;
pub const REEL_DIR_NAME_LEN: usize = 11;

const HUMAN_DATE_FORMAT: &str = "%Y-%m-%d";
const FD_DATE_FORMAT: &str = "%Y%m%d";

/// An operator-supplied date in both of its on-disk encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IssueDate(NaiveDate);

impl IssueDate {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        NaiveDate::parse_from_str(trimmed, HUMAN_DATE_FORMAT)
            .map(Self)
            .map_err(|err| {
                RepairError::InvalidInput(format!("date `{trimmed}` is not YYYY-MM-DD: {err}"))
                    .into()
            })
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    /// `1923-01-05`, as written in `LABEL`, `dateIssued` and `issueDate`.
    pub fn human(self) -> String {
        self.0.format(HUMAN_DATE_FORMAT).to_string()
    }

    /// `19230105`, as written in directory and file names.
    pub fn file_descriptor(self) -> String {
        self.0.format(FD_DATE_FORMAT).to_string()
    }
}

pub fn validate_lccn(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RepairError::InvalidInput("LCCN cannot be empty".to_string()).into());
    }
    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(RepairError::InvalidInput(format!(
            "LCCN `{trimmed}` must contain only ASCII letters and digits"
        ))
        .into());
    }
    Ok(trimmed.to_string())
}

/// Numeric part of an LCCN (`sn87654321` -> 87654321), used to order reels.
pub fn lccn_numeric(lccn: &str) -> Option<u64> {
    let digits: String = lccn.chars().skip_while(|c| !c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Parse the date encoded in an issue directory name (`YYYYMMDD` + 2-digit edition).
pub fn issue_dir_date(name: &str) -> Option<NaiveDate> {
    if name.len() != ISSUE_DIR_NAME_LEN || !name.is_ascii() {
        return None;
    }
    NaiveDate::parse_from_str(&name[..8], FD_DATE_FORMAT).ok()
}

pub fn is_issue_dir_name(name: &str) -> bool {
    issue_dir_date(name).is_some() && name[8..].chars().all(|c| c.is_ascii_digit())
}

pub fn is_reel_dir_name(name: &str) -> bool {
    name.len() == REEL_DIR_NAME_LEN && name.chars().all(|c| c.is_ascii_digit())
}

pub fn file_name_str(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// One date+edition issue directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDir {
    pub lccn: String,
    pub date: NaiveDate,
    pub edition: u8,
    pub path: PathBuf,
}

impl IssueDir {
    pub fn from_path(lccn: &str, path: &Path) -> Option<Self> {
        let name = file_name_str(path)?;
        if !is_issue_dir_name(name) {
            return None;
        }
        Some(Self {
            lccn: lccn.to_string(),
            date: issue_dir_date(name)?,
            edition: name[8..].parse().ok()?,
            path: path.to_path_buf(),
        })
    }
}

/// Path of `path` below `base`, joined with forward slashes the way batch
/// index entries reference files.
pub fn relative_tail(base: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(base).map_err(|_| {
        RepairError::layout(path, format!("not located under {}", base.display()))
    })?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => {
                return Err(RepairError::layout(path, "unexpected path component").into());
            }
        }
    }
    Ok(parts.join("/"))
}

/// Batch root of an issue: the parent of its nearest ancestor whose name
/// contains `lccn`.
pub fn batch_root_of(issue_path: &Path, lccn: &str) -> Result<PathBuf> {
    issue_path
        .ancestors()
        .skip(1)
        .find(|dir| file_name_str(dir).is_some_and(|name| name.contains(lccn)))
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            RepairError::layout(issue_path, format!("no enclosing directory named for {lccn}")).into()
        })
}

/// Paths of the reel and LCCN directories holding an issue directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReelLocation {
    pub reel_dir: PathBuf,
    pub lccn_dir: PathBuf,
    pub reel_number: String,
}

impl ReelLocation {
    pub fn of_issue(issue_path: &Path) -> Result<Self> {
        let reel_dir = issue_path
            .parent()
            .ok_or_else(|| RepairError::layout(issue_path, "issue directory has no parent"))?;
        let reel_number = file_name_str(reel_dir)
            .filter(|name| is_reel_dir_name(name))
            .ok_or_else(|| {
                RepairError::layout(issue_path, "issue directory is not inside an 11-digit reel directory")
            })?
            .to_string();
        let lccn_dir = reel_dir
            .parent()
            .ok_or_else(|| RepairError::layout(reel_dir, "reel directory has no parent"))?;
        Ok(Self {
            reel_dir: reel_dir.to_path_buf(),
            lccn_dir: lccn_dir.to_path_buf(),
            reel_number,
        })
    }

    /// The reel's own manifest, `<reel>/<reel>.xml`.
    pub fn manifest_path(&self) -> PathBuf {
        self.reel_dir.join(format!("{}.xml", self.reel_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_render_in_both_encodings() {
        let date = IssueDate::parse("1923-01-05").expect("parse");
        assert_eq!(date.human(), "1923-01-05");
        assert_eq!(date.file_descriptor(), "19230105");
    }

    #[test]
    fn malformed_dates_are_invalid_input() {
        for raw in ["1923/01/05", "19230105", "1923-13-01", ""] {
            let err = IssueDate::parse(raw).expect_err(raw);
            assert!(err.downcast_ref::<RepairError>().is_some(), "{raw}");
        }
    }

    #[test]
    fn issue_dir_names_need_ten_characters() {
        assert!(is_issue_dir_name("1923010501"));
        assert!(!is_issue_dir_name("19230105"));
        assert!(!is_issue_dir_name("192301050"));
        assert!(!is_issue_dir_name("19231301xx"));
        assert!(!is_issue_dir_name("00271763289"));
    }

    #[test]
    fn reel_dir_names_are_eleven_digits() {
        assert!(is_reel_dir_name("00271763289"));
        assert!(!is_reel_dir_name("0027176328"));
        assert!(!is_reel_dir_name("sn271763289"));
    }

    #[test]
    fn lccn_numeric_strips_prefix() {
        assert_eq!(lccn_numeric("sn87654321"), Some(87_654_321));
        assert_eq!(lccn_numeric("2010270501"), Some(2_010_270_501));
        assert_eq!(lccn_numeric("sn"), None);
    }

    #[test]
    fn lccn_validation_rejects_path_separators() {
        assert!(validate_lccn("sn12345678").is_ok());
        assert!(validate_lccn("sn1234/5678").is_err());
        assert!(validate_lccn("  ").is_err());
    }

    #[test]
    fn issue_dir_parses_edition() {
        let issue = IssueDir::from_path("sn12345678", Path::new("/b/sn12345678/00271763289/1923010502"))
            .expect("issue");
        assert_eq!(issue.edition, 2);
        assert_eq!(issue.date, NaiveDate::from_ymd_opt(1923, 1, 5).expect("date"));
    }

    #[test]
    fn reel_location_requires_reel_parent() {
        let loc = ReelLocation::of_issue(Path::new("/b/sn12345678/00271763289/1923010501"))
            .expect("reel");
        assert_eq!(loc.reel_number, "00271763289");
        assert_eq!(loc.lccn_dir, Path::new("/b/sn12345678"));
        assert_eq!(
            loc.manifest_path(),
            Path::new("/b/sn12345678/00271763289/00271763289.xml")
        );
        assert!(ReelLocation::of_issue(Path::new("/b/sn12345678/1923010501")).is_err());
    }

    #[test]
    fn relative_tail_uses_forward_slashes() {
        let tail = relative_tail(
            Path::new("/b"),
            Path::new("/b/sn12345678/00271763289/1923010501"),
        )
        .expect("tail");
        assert_eq!(tail, "sn12345678/00271763289/1923010501");
        assert!(relative_tail(Path::new("/other"), Path::new("/b/x")).is_err());
    }

    #[test]
    fn batch_root_is_parent_of_nearest_lccn_dir() {
        let issue = Path::new("/data/batch_sn12345678/sn12345678/00271763289/1923010501");
        assert_eq!(
            batch_root_of(issue, "sn12345678").expect("root"),
            Path::new("/data/batch_sn12345678")
        );
        assert!(batch_root_of(issue, "sn87654321").is_err());
    }
}
