use crate::error::RepairError;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SEARCH_ROOT: &str = "/opt/openoni/data/batches";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub search_root: PathBuf,
    #[serde(default = "default_batch_manifests")]
    pub batch_manifests: Vec<String>,
}

fn default_batch_manifests() -> Vec<String> {
    vec!["batch.xml".to_string(), "batch_1.xml".to_string()]
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            search_root: PathBuf::from(DEFAULT_SEARCH_ROOT),
            batch_manifests: default_batch_manifests(),
        }
    }
}

/// Everything a repair run needs, fixed before any archive is touched.
#[derive(Debug, Clone, Serialize, Default)]
pub struct RepairConfig {
    pub archive: ArchiveConfig,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialArchiveConfig {
    search_root: Option<PathBuf>,
    batch_manifests: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialRepairConfig {
    archive: Option<PartialArchiveConfig>,
}

/// Overrides collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub search_dir: Option<PathBuf>,
    pub dry_run: bool,
}

fn env_or_path(var: &str, fallback: &Path) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback.to_path_buf(),
    }
}

fn env_or_csv(var: &str, fallback: &[String]) -> Vec<String> {
    match env::var(var) {
        Ok(v) => {
            let out = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>();
            if out.is_empty() { fallback.to_vec() } else { out }
        }
        Err(_) => fallback.to_vec(),
    }
}

fn validate(cfg: &RepairConfig) -> Result<()> {
    let root = &cfg.archive.search_root;
    if !root.exists() {
        return Err(RepairError::InvalidInput(format!(
            "search directory {} does not exist",
            root.display()
        ))
        .into());
    }
    if !root.is_dir() {
        return Err(RepairError::InvalidInput(format!(
            "search directory {} is not a directory",
            root.display()
        ))
        .into());
    }
    if cfg.archive.batch_manifests.is_empty() {
        return Err(RepairError::InvalidInput(
            "batch manifest list cannot be empty".to_string(),
        )
        .into());
    }
    if cfg
        .archive
        .batch_manifests
        .iter()
        .any(|name| name.trim().is_empty() || name.contains('/'))
    {
        return Err(RepairError::InvalidInput(
            "batch manifest names must be plain file names".to_string(),
        )
        .into());
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("NDNP_REPAIR_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let config = dirs::config_dir()?;
    Some(config.join("ndnp-repair").join("config.toml"))
}

fn merge_file_config(base: &mut RepairConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: PartialRepairConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse config {}: {err}", path.display()))?;
    if let Some(archive) = parsed.archive {
        if let Some(search_root) = archive.search_root {
            base.archive.search_root = search_root;
        }
        if let Some(batch_manifests) = archive.batch_manifests {
            base.archive.batch_manifests = batch_manifests;
        }
    }
    Ok(())
}

pub fn load_config(overrides: &CliOverrides) -> Result<RepairConfig> {
    let mut cfg = RepairConfig::default();
    if let Some(path) = resolve_config_path() {
        merge_file_config(&mut cfg, &path)?;
    }

    cfg.archive.search_root = env_or_path("NDNP_SEARCH_DIR", &cfg.archive.search_root);
    cfg.archive.batch_manifests =
        env_or_csv("NDNP_BATCH_MANIFESTS", &cfg.archive.batch_manifests);
    if let Some(dir) = &overrides.search_dir {
        cfg.archive.search_root = dir.clone();
    }
    cfg.dry_run = overrides.dry_run;

    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_config_overrides_defaults_field_by_field() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[archive]\nsearch_root = \"/srv/batches\"\n").expect("write");

        let mut cfg = RepairConfig::default();
        merge_file_config(&mut cfg, &path).expect("merge");
        assert_eq!(cfg.archive.search_root, PathBuf::from("/srv/batches"));
        assert_eq!(cfg.archive.batch_manifests, default_batch_manifests());
    }

    #[test]
    fn missing_file_config_is_ignored() {
        let tmp = tempdir().expect("tempdir");
        let mut cfg = RepairConfig::default();
        merge_file_config(&mut cfg, &tmp.path().join("absent.toml")).expect("merge");
        assert_eq!(cfg.archive.search_root, PathBuf::from(DEFAULT_SEARCH_ROOT));
    }

    #[test]
    fn unparsable_file_config_is_an_error() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[archive\n").expect("write");
        let mut cfg = RepairConfig::default();
        assert!(merge_file_config(&mut cfg, &path).is_err());
    }

    #[test]
    fn validation_rejects_missing_root_and_empty_manifest_list() {
        let tmp = tempdir().expect("tempdir");
        let mut cfg = RepairConfig::default();
        cfg.archive.search_root = tmp.path().join("nope");
        let err = validate(&cfg).expect_err("missing root");
        assert!(matches!(
            err.downcast_ref::<RepairError>(),
            Some(RepairError::InvalidInput(_))
        ));

        cfg.archive.search_root = tmp.path().to_path_buf();
        validate(&cfg).expect("valid");

        cfg.archive.batch_manifests.clear();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn file_as_root_is_rejected() {
        let tmp = tempdir().expect("tempdir");
        let file = tmp.path().join("batches");
        fs::write(&file, "").expect("write");
        let cfg = RepairConfig {
            archive: ArchiveConfig {
                search_root: file,
                ..ArchiveConfig::default()
            },
            dry_run: false,
        };
        assert!(validate(&cfg).is_err());
    }
}
