pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod text;

pub use config::AppConfig;
pub use error::{CoreError, Result};
pub use models::{CandidatePool, FieldSchema, PoolEntry, RecordField, RecordFields, TagSource};
pub use text::normalize::{TextNormalizer, clean, extract_main_keyword, normalize, simplify};
pub use text::similarity::SimilarityScorer;
