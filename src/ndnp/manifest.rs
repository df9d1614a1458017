//! The three NDNP XML dialects and their load/save rules.

use crate::error::RepairError;
use crate::ndnp::xml::{Document, TreeBuilder};
use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

pub const ALTO_NS: &str = "http://schema.ccs-gmbh.com/ALTO";
pub const METS_NS: &str = "http://www.loc.gov/METS/";
pub const MODS_NS: &str = "http://www.loc.gov/mods/v3";
pub const NDNP_NS: &str = "http://www.loc.gov/ndnp";
pub const NP_NS: &str = "urn:library-of-congress:ndnp:mets:newspaper";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

const PAGE_BINDINGS: &[(&str, &str)] = &[("", ALTO_NS)];

const ISSUE_BINDINGS: &[(&str, &str)] = &[
    ("", METS_NS),
    ("mix", "http://www.loc.gov/mix/"),
    ("ndnp", NDNP_NS),
    ("premis", "http://www.oclc.org/premis"),
    ("mods", MODS_NS),
    ("xsi", XSI_NS),
    ("xlink", "http://www.w3.org/1999/xlink"),
    ("np", NP_NS),
];

const BATCH_BINDINGS: &[(&str, &str)] = &[("", NDNP_NS), ("xsi", XSI_NS)];

static PAGE_MANIFEST_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}\.xml$").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// ALTO OCR layout for one page (`0001.xml`).
    PageManifest,
    /// METS description of one issue.
    IssueManifest,
    /// `batch.xml` / `batch_1.xml` at the batch root.
    BatchIndex,
}

impl Dialect {
    /// Dialect of an XML file found inside an issue directory.
    pub fn of_issue_file(file_name: &str) -> Option<Self> {
        if !file_name.ends_with(".xml") {
            return None;
        }
        if PAGE_MANIFEST_NAME.is_match(file_name) {
            Some(Self::PageManifest)
        } else {
            Some(Self::IssueManifest)
        }
    }

    /// Prefix bindings the dialect is written with.
    pub fn bindings(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::PageManifest => PAGE_BINDINGS,
            Self::IssueManifest => ISSUE_BINDINGS,
            Self::BatchIndex => BATCH_BINDINGS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PageManifest => "page",
            Self::IssueManifest => "issue",
            Self::BatchIndex => "batch",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Manifest {
    pub dialect: Dialect,
    pub path: PathBuf,
    pub document: Document,
}

impl Manifest {
    pub fn load(path: &Path, dialect: Dialect) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let document = TreeBuilder::default()
            .preserve_comments(true)
            .build(&raw)
            .map_err(|err| RepairError::malformed(path, format!("{err:#}")))?;

        let manifest = Self {
            dialect,
            path: path.to_path_buf(),
            document,
        };
        for prefix in manifest.undeclared_prefixes() {
            debug!(path = %path.display(), prefix, dialect = dialect.as_str(), "dialect namespace not declared on root");
        }
        Ok(manifest)
    }

    /// Dialect prefixes the root element does not bind.
    pub fn undeclared_prefixes(&self) -> Vec<&'static str> {
        let declared = self
            .document
            .root()
            .map(|root| root.namespace_declarations())
            .unwrap_or_default();
        self.dialect
            .bindings()
            .iter()
            .filter(|(prefix, uri)| {
                !declared
                    .iter()
                    .any(|(p, u)| p.as_str() == *prefix && u.as_str() == *uri)
            })
            .map(|(prefix, _)| *prefix)
            .collect()
    }

    /// Give every METS `structMap` an `np` binding when none is in scope.
    /// Returns the number of elements patched.
    fn restore_struct_map_namespace(&mut self) -> usize {
        if self.dialect != Dialect::IssueManifest {
            return 0;
        }
        let mut patched = 0;
        self.document.for_each_element_mut(|el, scope| {
            if scope.is(el, METS_NS, "structMap") && scope.resolve("np").is_none() {
                el.set_attr("xmlns:np", NP_NS);
                patched += 1;
            }
        });
        patched
    }

    /// Serialise and atomically replace the file at `path`.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        let patched = self.restore_struct_map_namespace();
        if patched > 0 {
            debug!(path = %path.display(), patched, "restored np namespace on structMap");
        }

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(parent)
            .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
        tmp.write_all(self.document.to_xml_string().as_bytes())
            .with_context(|| format!("failed to write temp file for {}", path.display()))?;
        tmp.as_file()
            .sync_all()
            .with_context(|| format!("failed to sync temp file for {}", path.display()))?;
        if let Ok(meta) = fs::metadata(path) {
            // Keep the archive file's mode rather than the temp file's 0600.
            if let Err(err) = fs::set_permissions(tmp.path(), meta.permissions()) {
                warn!(path = %path.display(), error = %err, "could not carry file permissions over");
            }
        }
        tmp.persist(path)
            .with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndnp::fixtures::ISSUE_XML;
    use tempfile::tempdir;

    #[test]
    fn page_file_names_are_four_digits() {
        assert_eq!(Dialect::of_issue_file("0001.xml"), Some(Dialect::PageManifest));
        assert_eq!(Dialect::of_issue_file("1923010501.xml"), Some(Dialect::IssueManifest));
        assert_eq!(Dialect::of_issue_file("1923010501_1.xml"), Some(Dialect::IssueManifest));
        assert_eq!(Dialect::of_issue_file("0001.jp2"), None);
        assert_eq!(Dialect::of_issue_file("00001.xml"), Some(Dialect::IssueManifest));
    }

    #[test]
    fn bindings_match_dialect_sizes() {
        assert_eq!(Dialect::PageManifest.bindings().len(), 1);
        assert_eq!(Dialect::IssueManifest.bindings().len(), 8);
        assert_eq!(Dialect::BatchIndex.bindings().len(), 2);
    }

    #[test]
    fn save_restores_np_on_struct_map_only() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("1923010501.xml");
        fs::write(&path, ISSUE_XML).expect("write");

        let mut manifest = Manifest::load(&path, Dialect::IssueManifest).expect("load");
        assert_eq!(manifest.undeclared_prefixes(), vec!["np"]);
        manifest.save(&path).expect("save");

        let saved = fs::read_to_string(&path).expect("read");
        let expected = ISSUE_XML.replace(
            "<structMap>",
            "<structMap xmlns:np=\"urn:library-of-congress:ndnp:mets:newspaper\">",
        );
        assert_eq!(saved, expected);
    }

    #[test]
    fn save_leaves_existing_np_binding_alone() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("1923010501.xml");
        let source = ISSUE_XML.replace(
            "<structMap>",
            "<structMap xmlns:np=\"urn:library-of-congress:ndnp:mets:newspaper\">",
        );
        fs::write(&path, &source).expect("write");

        let mut manifest = Manifest::load(&path, Dialect::IssueManifest).expect("load");
        manifest.save(&path).expect("save");
        assert_eq!(fs::read_to_string(&path).expect("read"), source);
    }

    #[test]
    fn page_and_batch_round_trip_byte_identical() {
        let tmp = tempdir().expect("tempdir");
        let page = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<alto xmlns=\"http://schema.ccs-gmbh.com/ALTO\">\n<!-- ocr -->\n<Layout><Page><PrintSpace><TextBlock><TextLine><String CONTENT=\"January\"/></TextLine></TextBlock></PrintSpace></Page></Layout>\n</alto>\n";
        let batch = "<?xml version='1.0' encoding='UTF-8'?>\n<batch xmlns=\"http://www.loc.gov/ndnp\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" name=\"batch_x\">\n\t<issue editionOrder=\"01\" issueDate=\"1923-01-05\" lccn=\"sn12345678\">sn12345678/00271763289/1923010501/1923010501.xml</issue>\n\t<reel reelNumber=\"00271763289\">sn12345678/00271763289/00271763289.xml</reel>\n</batch>\n";
        for (name, body, dialect) in [
            ("0001.xml", page, Dialect::PageManifest),
            ("batch.xml", batch, Dialect::BatchIndex),
        ] {
            let path = tmp.path().join(name);
            fs::write(&path, body).expect("write");
            let mut manifest = Manifest::load(&path, dialect).expect("load");
            assert!(manifest.undeclared_prefixes().is_empty(), "{name}");
            manifest.save(&path).expect("save");
            assert_eq!(fs::read_to_string(&path).expect("read"), body, "{name}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn save_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("1923010501.xml");
        fs::write(&path, ISSUE_XML).expect("write");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).expect("chmod");

        let mut manifest = Manifest::load(&path, Dialect::IssueManifest).expect("load");
        manifest.save(&path).expect("save");
        let mode = fs::metadata(&path).expect("meta").permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn unparsable_manifest_is_malformed() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("broken.xml");
        fs::write(&path, "<mets><dmdSec></mets>").expect("write");
        let err = Manifest::load(&path, Dialect::IssueManifest).expect_err("broken");
        assert!(matches!(
            err.downcast_ref::<RepairError>(),
            Some(RepairError::MalformedManifest { .. })
        ));
    }
}
