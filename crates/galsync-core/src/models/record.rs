use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// Semantic fields of a game record, independent of how the storage backend
/// names its columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Title,
    Alias,
    Summary,
    OfficialUrl,
    DlsiteUrl,
    FanzaUrl,
    Size,
    ReleaseDate,
    Script,
    Illustrator,
    VoiceActor,
    Music,
    Tags,
    Price,
    Cover,
    Brand,
    ResourceUrl,
    GameType,
    BangumiUrl,
}

impl RecordField {
    pub const ALL: [RecordField; 19] = [
        RecordField::Title,
        RecordField::Alias,
        RecordField::Summary,
        RecordField::OfficialUrl,
        RecordField::DlsiteUrl,
        RecordField::FanzaUrl,
        RecordField::Size,
        RecordField::ReleaseDate,
        RecordField::Script,
        RecordField::Illustrator,
        RecordField::VoiceActor,
        RecordField::Music,
        RecordField::Tags,
        RecordField::Price,
        RecordField::Cover,
        RecordField::Brand,
        RecordField::ResourceUrl,
        RecordField::GameType,
        RecordField::BangumiUrl,
    ];

    /// Key used for this field in the `[storage.field_names]` table.
    pub fn key(self) -> &'static str {
        match self {
            RecordField::Title => "title",
            RecordField::Alias => "alias",
            RecordField::Summary => "summary",
            RecordField::OfficialUrl => "official_url",
            RecordField::DlsiteUrl => "dlsite_url",
            RecordField::FanzaUrl => "fanza_url",
            RecordField::Size => "size",
            RecordField::ReleaseDate => "release_date",
            RecordField::Script => "script",
            RecordField::Illustrator => "illustrator",
            RecordField::VoiceActor => "voice_actor",
            RecordField::Music => "music",
            RecordField::Tags => "tags",
            RecordField::Price => "price",
            RecordField::Cover => "cover",
            RecordField::Brand => "brand",
            RecordField::ResourceUrl => "resource_url",
            RecordField::GameType => "game_type",
            RecordField::BangumiUrl => "bangumi_url",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    /// Column name used by the record database unless configured otherwise.
    pub fn default_storage_name(self) -> &'static str {
        match self {
            RecordField::Title => "游戏名称",
            RecordField::Alias => "游戏别名",
            RecordField::Summary => "游戏简介",
            RecordField::OfficialUrl => "游戏官网",
            RecordField::DlsiteUrl => "DLsite链接",
            RecordField::FanzaUrl => "Fanza链接",
            RecordField::Size => "游戏大小",
            RecordField::ReleaseDate => "发售时间",
            RecordField::Script => "剧本",
            RecordField::Illustrator => "原画",
            RecordField::VoiceActor => "声优",
            RecordField::Music => "音乐",
            RecordField::Tags => "标签",
            RecordField::Price => "价格",
            RecordField::Cover => "游戏封面",
            RecordField::Brand => "游戏厂商",
            RecordField::ResourceUrl => "GGBases资源",
            RecordField::GameType => "游戏类别",
            RecordField::BangumiUrl => "Bangumi链接",
        }
    }

    /// Default `[storage.field_names]` table.
    pub fn default_names() -> BTreeMap<String, String> {
        Self::ALL
            .into_iter()
            .map(|f| (f.key().to_string(), f.default_storage_name().to_string()))
            .collect()
    }
}

/// Field values keyed by semantic field.
pub type RecordFields = BTreeMap<RecordField, Value>;

/// Validated mapping from semantic fields to storage field identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    names: BTreeMap<RecordField, String>,
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self {
            names: RecordField::ALL
                .into_iter()
                .map(|f| (f, f.default_storage_name().to_string()))
                .collect(),
        }
    }
}

impl FieldSchema {
    /// Build the schema from the configured name table.
    ///
    /// Every field must be mapped to a distinct, non-blank name and every
    /// key must name a known field.
    pub fn from_names(configured: &BTreeMap<String, String>) -> Result<Self> {
        let mut names = BTreeMap::new();
        for (key, name) in configured {
            let field = RecordField::from_key(key)
                .ok_or_else(|| CoreError::Config(format!("unknown record field '{key}'")))?;
            if name.trim().is_empty() {
                return Err(CoreError::Config(format!(
                    "record field '{key}' has a blank storage name"
                )));
            }
            names.insert(field, name.trim().to_string());
        }

        let missing: Vec<&str> = RecordField::ALL
            .into_iter()
            .filter(|f| !names.contains_key(f))
            .map(RecordField::key)
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::Config(format!(
                "record fields without a storage name: {}",
                missing.join(", ")
            )));
        }

        let mut seen = HashSet::new();
        for name in names.values() {
            if !seen.insert(name.as_str()) {
                return Err(CoreError::Config(format!(
                    "storage name '{name}' is mapped more than once"
                )));
            }
        }

        Ok(Self { names })
    }

    pub fn name(&self, field: RecordField) -> &str {
        // from_names guarantees every field is present
        self.names.get(&field).map(String::as_str).unwrap_or_default()
    }

    /// Translate semantic field values into a storage payload.
    pub fn render(&self, fields: &RecordFields) -> Map<String, Value> {
        fields
            .iter()
            .map(|(field, value)| (self.name(*field).to_string(), value.clone()))
            .collect()
    }
}
