use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::TagSource;
use crate::storage::json_file::{read_json_or_default, write_json_pretty};

/// Raw tag → canonical tag. An empty value means "not translated yet".
pub type TranslationTable = BTreeMap<String, String>;

/// Main tag → alias keywords (self-inclusive).
pub type MergeGraph = BTreeMap<String, Vec<String>>;

/// Raw tags the user never wants to be asked about again.
pub type IgnoreSet = BTreeSet<String>;

/// Canonical brand → aliases.
pub type BrandMap = BTreeMap<String, Vec<String>>;

const MERGE_GRAPH_FILE: &str = "tag_mapping_dict.json";
const IGNORE_FILE: &str = "tag_ignore_list.json";
const BRAND_FILE: &str = "brand_mapping.json";

/// The mapping directory and the JSON files inside it.
///
/// Every save rewrites the whole file, pretty-printed and sorted by key, so
/// the files stay stable for hand editing.
#[derive(Debug, Clone)]
pub struct MappingFiles {
    dir: PathBuf,
}

impl MappingFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self, source: TagSource) -> PathBuf {
        self.dir.join(source.table_file())
    }

    pub fn merge_graph_path(&self) -> PathBuf {
        self.dir.join(MERGE_GRAPH_FILE)
    }

    pub fn ignore_path(&self) -> PathBuf {
        self.dir.join(IGNORE_FILE)
    }

    pub fn brand_path(&self) -> PathBuf {
        self.dir.join(BRAND_FILE)
    }

    pub fn load_table(&self, source: TagSource) -> TranslationTable {
        read_json_or_default(&self.table_path(source))
    }

    pub fn save_table(&self, source: TagSource, table: &TranslationTable) -> Result<()> {
        write_json_pretty(&self.table_path(source), table)
    }

    pub fn load_merge_graph(&self) -> MergeGraph {
        read_json_or_default(&self.merge_graph_path())
    }

    pub fn save_merge_graph(&self, graph: &MergeGraph) -> Result<()> {
        write_json_pretty(&self.merge_graph_path(), graph)
    }

    /// Stored as a sorted JSON array.
    pub fn load_ignore(&self) -> IgnoreSet {
        read_json_or_default(&self.ignore_path())
    }

    pub fn save_ignore(&self, ignore: &IgnoreSet) -> Result<()> {
        write_json_pretty(&self.ignore_path(), ignore)
    }

    pub fn load_brands(&self) -> BrandMap {
        read_json_or_default(&self.brand_path())
    }

    pub fn save_brands(&self, brands: &BrandMap) -> Result<()> {
        write_json_pretty(&self.brand_path(), brands)
    }
}
