//! Rewrites the XML fields that encode an issue's date or LCCN.
//!
//! Both corrections are idempotent: once applied, the value they look for is
//! gone (or already equal to the target) and a second pass changes nothing.
//! Each returns the number of fields rewritten.

use crate::error::RepairError;
use crate::ndnp::layout::IssueDate;
use crate::ndnp::manifest::{Dialect, MODS_NS, Manifest, NDNP_NS};
use crate::ndnp::xml::Element;
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct DateCorrection {
    pub bad: IssueDate,
    pub new: IssueDate,
    /// Batch-relative path of the issue directory before renaming.
    pub issue_tail: String,
}

#[derive(Debug, Clone)]
pub struct LccnCorrection {
    pub bad_lccn: String,
    pub correct_lccn: String,
    /// Batch-relative path of the issue directory before relocation.
    pub issue_tail: String,
}

fn replace_in_attr(el: &mut Element, key: &str, from: &str, to: &str) -> bool {
    match el.attr(key) {
        Some(value) if value.contains(from) => {
            el.set_attr(key, &value.replace(from, to));
            true
        }
        _ => false,
    }
}

pub fn correct_date(manifest: &mut Manifest, fix: &DateCorrection) -> Result<usize> {
    let bad = fix.bad.human();
    let new = fix.new.human();

    match manifest.dialect {
        Dialect::PageManifest => {
            let mut changed = 0;
            manifest.document.for_each_element_mut(|el, _| {
                if el.local_name() != "PrintSpace" {
                    return;
                }
                el.for_each_element_mut(&mut |string| {
                    if string.local_name() == "String" && replace_in_attr(string, "CONTENT", &bad, &new)
                    {
                        changed += 1;
                    }
                });
            });
            Ok(changed)
        }
        Dialect::IssueManifest => {
            let mut changed = 0;
            if let Some(root) = manifest.document.root_mut() {
                if replace_in_attr(root, "LABEL", &bad, &new) {
                    changed += 1;
                }
            }
            let path = manifest.path.clone();
            let date_issued = manifest
                .document
                .find_first_mut(MODS_NS, "dateIssued")
                .ok_or_else(|| RepairError::malformed(&path, "no mods:dateIssued element"))?;
            let text = date_issued.text().unwrap_or_default();
            if text.contains(&bad) {
                date_issued.set_text(&text.replace(&bad, &new));
                changed += 1;
            }
            Ok(changed)
        }
        Dialect::BatchIndex => {
            let bad_fd = fix.bad.file_descriptor();
            let new_fd = fix.new.file_descriptor();
            let mut changed = 0;
            manifest.document.for_each_element_mut(|el, scope| {
                if !scope.is(el, NDNP_NS, "issue") {
                    return;
                }
                let text = el.text().unwrap_or_default();
                if !text.contains(&fix.issue_tail) {
                    return;
                }
                if replace_in_attr(el, "issueDate", &bad, &new) {
                    changed += 1;
                }
                el.set_text(&text.replace(&bad_fd, &new_fd));
                changed += 1;
            });
            Ok(changed)
        }
    }
}

pub fn correct_lccn(manifest: &mut Manifest, fix: &LccnCorrection) -> Result<usize> {
    match manifest.dialect {
        // ALTO pages carry no LCCN.
        Dialect::PageManifest => Ok(0),
        Dialect::IssueManifest => {
            let path = manifest.path.clone();
            let identifier = manifest
                .document
                .find_first_mut(MODS_NS, "identifier")
                .ok_or_else(|| RepairError::malformed(&path, "no mods:identifier element"))?;
            if identifier.text().as_deref() == Some(fix.correct_lccn.as_str()) {
                return Ok(0);
            }
            identifier.set_text(&fix.correct_lccn);
            Ok(1)
        }
        Dialect::BatchIndex => {
            let mut changed = 0;
            manifest.document.for_each_element_mut(|el, scope| {
                if !scope.is(el, NDNP_NS, "issue") {
                    return;
                }
                let text = el.text().unwrap_or_default();
                if !text.contains(&fix.issue_tail) {
                    return;
                }
                if el.attr("lccn").as_deref() != Some(fix.correct_lccn.as_str()) {
                    el.set_attr("lccn", &fix.correct_lccn);
                }
                el.set_text(&text.replace(&fix.bad_lccn, &fix.correct_lccn));
                changed += 1;
            });
            Ok(changed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndnp::fixtures::{BATCH_XML, ISSUE_XML, PAGE_XML};
    use crate::ndnp::xml::parse;
    use std::path::PathBuf;

    fn manifest(source: &str, dialect: Dialect) -> Manifest {
        Manifest {
            dialect,
            path: PathBuf::from("fixture.xml"),
            document: parse(source).expect("parse"),
        }
    }

    fn date_fix(tail: &str) -> DateCorrection {
        DateCorrection {
            bad: IssueDate::parse("1923-01-05").expect("bad"),
            new: IssueDate::parse("1923-01-06").expect("new"),
            issue_tail: tail.to_string(),
        }
    }

    fn lccn_fix() -> LccnCorrection {
        LccnCorrection {
            bad_lccn: "sn12345678".to_string(),
            correct_lccn: "sn87654321".to_string(),
            issue_tail: "sn12345678/00271763289/1923010501".to_string(),
        }
    }

    #[test]
    fn issue_manifest_rewrites_label_and_date_issued() {
        let mut m = manifest(ISSUE_XML, Dialect::IssueManifest);
        assert_eq!(correct_date(&mut m, &date_fix("")).expect("fix"), 2);
        let out = m.document.to_xml_string();
        assert!(out.contains("LABEL=\"Evening News, 1923-01-06\""));
        assert!(out.contains("<mods:dateIssued encoding=\"iso8601\">1923-01-06</mods:dateIssued>"));
        assert!(out.contains("<!-- digitized by the state library -->"));
    }

    #[test]
    fn human_label_without_iso_date_is_left_alone() {
        let source = ISSUE_XML.replace(
            "LABEL=\"Evening News, 1923-01-05\"",
            "LABEL=\"Evening News, January 5, 1923\"",
        );
        let mut m = manifest(&source, Dialect::IssueManifest);
        assert_eq!(correct_date(&mut m, &date_fix("")).expect("fix"), 1);
        let out = m.document.to_xml_string();
        assert!(out.contains("LABEL=\"Evening News, January 5, 1923\""));
        assert!(out.contains(">1923-01-06</mods:dateIssued>"));
    }

    #[test]
    fn date_correction_is_idempotent() {
        let mut once = manifest(ISSUE_XML, Dialect::IssueManifest);
        correct_date(&mut once, &date_fix("")).expect("first");
        let mut twice = once.clone();
        assert_eq!(correct_date(&mut twice, &date_fix("")).expect("second"), 0);
        assert_eq!(once.document, twice.document);
    }

    #[test]
    fn missing_date_issued_is_malformed() {
        let source = ISSUE_XML.replace(
            "<mods:dateIssued encoding=\"iso8601\">1923-01-05</mods:dateIssued>",
            "",
        );
        let mut m = manifest(&source, Dialect::IssueManifest);
        let err = correct_date(&mut m, &date_fix("")).expect_err("malformed");
        assert!(matches!(
            err.downcast_ref::<RepairError>(),
            Some(RepairError::MalformedManifest { .. })
        ));
    }

    #[test]
    fn page_manifest_only_touches_print_space_strings() {
        let mut m = manifest(PAGE_XML, Dialect::PageManifest);
        assert_eq!(correct_date(&mut m, &date_fix("")).expect("fix"), 2);
        let out = m.document.to_xml_string();
        assert!(out.contains("<String CONTENT=\"1923-01-06\"/><String CONTENT=\"issued 1923-01-06.\"/>"));
        assert!(out.contains("<TopMargin><TextBlock><TextLine><String CONTENT=\"1923-01-05\"/>"));
        assert!(out.contains("<fileName>1923-01-05 scan</fileName>"));
        assert!(out.contains("<!-- masthead -->"));
    }

    #[test]
    fn batch_index_rewrites_matching_issue_entry_only() {
        let mut m = manifest(BATCH_XML, Dialect::BatchIndex);
        let fix = date_fix("sn12345678/00271763289/1923010501");
        assert_eq!(correct_date(&mut m, &fix).expect("fix"), 2);
        let out = m.document.to_xml_string();
        assert!(out.contains(
            "<issue editionOrder=\"01\" issueDate=\"1923-01-06\" lccn=\"sn12345678\">sn12345678/00271763289/1923010601/1923010601.xml</issue>"
        ));
        assert!(out.contains("issueDate=\"1923-02-01\""));
        assert_eq!(correct_date(&mut m, &fix).expect("again"), 0);
    }

    #[test]
    fn identifier_is_overwritten_in_full() {
        let mut m = manifest(ISSUE_XML, Dialect::IssueManifest);
        assert_eq!(correct_lccn(&mut m, &lccn_fix()).expect("fix"), 1);
        assert!(m
            .document
            .to_xml_string()
            .contains("<mods:identifier type=\"lccn\">sn87654321</mods:identifier>"));
        assert_eq!(correct_lccn(&mut m, &lccn_fix()).expect("again"), 0);
    }

    #[test]
    fn page_manifest_has_no_lccn() {
        let mut m = manifest(PAGE_XML, Dialect::PageManifest);
        assert_eq!(correct_lccn(&mut m, &lccn_fix()).expect("fix"), 0);
        assert_eq!(m.document.to_xml_string(), PAGE_XML);
    }

    #[test]
    fn missing_identifier_is_malformed() {
        let source = ISSUE_XML.replace(
            "<mods:identifier type=\"lccn\">sn12345678</mods:identifier>",
            "",
        );
        let mut m = manifest(&source, Dialect::IssueManifest);
        assert!(correct_lccn(&mut m, &lccn_fix()).is_err());
    }

    #[test]
    fn batch_index_lccn_attribute_and_path_follow_relocation() {
        let mut m = manifest(BATCH_XML, Dialect::BatchIndex);
        assert_eq!(correct_lccn(&mut m, &lccn_fix()).expect("fix"), 1);
        let out = m.document.to_xml_string();
        assert!(out.contains(
            "<issue editionOrder=\"01\" issueDate=\"1923-01-05\" lccn=\"sn87654321\">sn87654321/00271763289/1923010501/1923010501.xml</issue>"
        ));
        assert!(out.contains(
            "lccn=\"sn12345678\">sn12345678/00271763289/1923010601/1923010601.xml"
        ));
        assert_eq!(correct_lccn(&mut m, &lccn_fix()).expect("again"), 0);
    }
}
