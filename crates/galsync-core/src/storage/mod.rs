//! JSON persistence: atomic writes, the title snapshot and mapping files.

pub mod json_file;
pub mod mapping;
pub mod snapshot;

pub use json_file::{atomic_write, read_json_or_default, write_json_pretty};
pub use mapping::{BrandMap, IgnoreSet, MappingFiles, MergeGraph, TranslationTable};
pub use snapshot::{load_snapshot, save_snapshot};
