use std::fmt;

use serde::{Deserialize, Serialize};

/// A source of raw tags, each with its own translation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    Dlsite,
    Fanza,
    Ggbases,
}

impl TagSource {
    pub const ALL: [TagSource; 3] = [TagSource::Dlsite, TagSource::Fanza, TagSource::Ggbases];

    /// Sources whose raw tags need a human translation when unmapped.
    /// GGBases tags are already readable and pass through unchanged.
    pub fn is_interactive(self) -> bool {
        !matches!(self, TagSource::Ggbases)
    }

    /// File name of this source's translation table inside the mapping dir.
    pub fn table_file(self) -> &'static str {
        match self {
            TagSource::Dlsite => "tag_jp_to_cn.json",
            TagSource::Fanza => "tag_fanza_to_cn.json",
            TagSource::Ggbases => "tag_ggbase.json",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TagSource::Dlsite => "dlsite",
            TagSource::Fanza => "fanza",
            TagSource::Ggbases => "ggbases",
        }
    }
}

impl fmt::Display for TagSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_ggbases_passes_through() {
        assert!(TagSource::Dlsite.is_interactive());
        assert!(TagSource::Fanza.is_interactive());
        assert!(!TagSource::Ggbases.is_interactive());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&TagSource::Fanza).unwrap();
        assert_eq!(json, "\"fanza\"");
        let parsed: TagSource = serde_json::from_str("\"ggbases\"").unwrap();
        assert_eq!(parsed, TagSource::Ggbases);
    }
}
