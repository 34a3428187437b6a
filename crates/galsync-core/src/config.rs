use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::models::{FieldSchema, RecordField};
use crate::storage::MappingFiles;
use crate::text::normalize::{DEFAULT_EDITION_QUALIFIERS, TextNormalizer};
use crate::text::similarity::SimilarityScorer;

/// Root application configuration, loaded from `~/.config/galsync/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub matching: MatchingConfig,
    pub interaction: InteractionConfig,
    pub pipeline: PipelineConfig,
    pub metadata_api: MetadataApiConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum score for a stored title to be shown as a duplicate candidate.
    pub title_threshold: f64,
    pub subject_high_threshold: f64,
    pub subject_low_threshold: f64,
    pub shortlist_size: usize,
    /// Weight of the full ratio when one string contains the other.
    pub containment_full_weight: f64,
    pub brand_threshold: f64,
    /// Minimum score for an unrelated main tag to be offered as a merge target.
    pub tag_merge_threshold: f64,
    pub edition_qualifiers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Seconds a front-end prompt may stay unanswered before its default applies.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataApiConfig {
    pub base_url: String,
    pub token_env: String,
    pub min_interval_ms: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Record field key → storage field name.
    pub field_names: BTreeMap<String, String>,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for PathsConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("galsync");
        Self {
            data_dir: data_dir.to_string_lossy().to_string(),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            title_threshold: 0.78,
            subject_high_threshold: 0.85,
            subject_low_threshold: 0.70,
            shortlist_size: 10,
            containment_full_weight: 0.8,
            brand_threshold: 0.85,
            tag_merge_threshold: 0.5,
            edition_qualifiers: DEFAULT_EDITION_QUALIFIERS
                .iter()
                .map(|q| q.to_string())
                .collect(),
        }
    }
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { max_concurrent: 3 }
    }
}

impl Default for MetadataApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.bgm.tv".to_string(),
            token_env: "BANGUMI_TOKEN".to_string(),
            min_interval_ms: 500,
            user_agent: "galsync/0.1 (+https://github.com/galsync/galsync)".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            field_names: RecordField::default_names(),
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/galsync/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("GALSYNC_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("galsync")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    /// Load and validate config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Reject settings that would make matching meaningless or leave the
    /// storage schema incomplete.
    pub fn validate(&self) -> Result<()> {
        let m = &self.matching;
        for (name, value) in [
            ("title_threshold", m.title_threshold),
            ("subject_high_threshold", m.subject_high_threshold),
            ("subject_low_threshold", m.subject_low_threshold),
            ("containment_full_weight", m.containment_full_weight),
            ("brand_threshold", m.brand_threshold),
            ("tag_merge_threshold", m.tag_merge_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CoreError::Validation(format!(
                    "matching.{name} must be within 0..=1, got {value}"
                )));
            }
        }
        if m.subject_low_threshold > m.subject_high_threshold {
            return Err(CoreError::Validation(
                "matching.subject_low_threshold exceeds subject_high_threshold".to_string(),
            ));
        }
        if m.shortlist_size == 0 {
            return Err(CoreError::Validation(
                "matching.shortlist_size must be at least 1".to_string(),
            ));
        }
        if self.pipeline.max_concurrent == 0 {
            return Err(CoreError::Validation(
                "pipeline.max_concurrent must be at least 1".to_string(),
            ));
        }
        self.field_schema()?;
        Ok(())
    }

    // ─── Derived values ────────────────────────────────────

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.data_dir)
    }

    /// Path to the local title snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir().join("cache").join("game_titles_cache.json")
    }

    pub fn mapping_dir(&self) -> PathBuf {
        self.data_dir().join("mapping")
    }

    /// Directory of the local JSON record store.
    pub fn records_dir(&self) -> PathBuf {
        self.data_dir().join("records")
    }

    pub fn mapping_files(&self) -> MappingFiles {
        MappingFiles::new(self.mapping_dir())
    }

    pub fn field_schema(&self) -> Result<FieldSchema> {
        FieldSchema::from_names(&self.storage.field_names)
    }

    pub fn normalizer(&self) -> TextNormalizer {
        TextNormalizer::with_qualifiers(&self.matching.edition_qualifiers)
    }

    pub fn scorer(&self) -> SimilarityScorer {
        SimilarityScorer::default().with_full_weight(self.matching.containment_full_weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.matching.title_threshold, 0.78);
        assert_eq!(cfg.interaction.timeout_secs, 60);
        assert_eq!(cfg.pipeline.max_concurrent, 3);
        assert!(!cfg.paths.data_dir.is_empty());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = AppConfig::default();
        cfg.matching.subject_high_threshold = 0.9;
        cfg.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.matching.subject_high_threshold, 0.9);
        assert_eq!(loaded.storage.field_names, cfg.storage.field_names);
        assert_eq!(loaded.matching.edition_qualifiers, cfg.matching.edition_qualifiers);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let cfg = AppConfig::load_from(Path::new("/tmp/nonexistent_galsync_config.toml")).unwrap();
        assert_eq!(cfg.metadata_api.base_url, "https://api.bgm.tv");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[matching]\ntitle_threshold = 0.8\n").unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.matching.title_threshold, 0.8);
        assert_eq!(cfg.matching.shortlist_size, 10);
        assert_eq!(cfg.storage.field_names.len(), RecordField::ALL.len());
    }

    #[test]
    fn test_invalid_thresholds_are_rejected() {
        let mut cfg = AppConfig::default();
        cfg.matching.title_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.matching.subject_low_threshold = 0.9;
        cfg.matching.subject_high_threshold = 0.8;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_incomplete_field_names_fail_at_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage.field_names]\ntitle = \"Name\"\n").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_derived_paths() {
        let mut cfg = AppConfig::default();
        cfg.paths.data_dir = "/data/galsync".to_string();
        assert_eq!(
            cfg.snapshot_path(),
            PathBuf::from("/data/galsync/cache/game_titles_cache.json")
        );
        assert_eq!(cfg.mapping_dir(), PathBuf::from("/data/galsync/mapping"));
        assert_eq!(cfg.records_dir(), PathBuf::from("/data/galsync/records"));
    }
}
