//! Entity resolution and tag taxonomy for galsync.
//!
//! Title de-duplication against a local candidate pool, subject matching
//! against a metadata API, tag translation and merging, and the
//! human-in-the-loop gateway every uncertain decision escalates to.

pub mod decision;
pub mod dedup;
pub mod error;
pub mod http;
pub mod interaction;
pub mod pipeline;
pub mod pool;
pub mod session;
pub mod sources;
pub mod store;
pub mod subject;
pub mod taxonomy;

pub use decision::{MatchDecision, MatchTier, Ranked};
pub use dedup::{DuplicateOutcome, TitleResolver};
pub use error::{ResolveError, Result};
pub use interaction::{
    ChannelGateway, ConsoleGateway, InteractionGate, InteractionGateway, InteractionRequest,
    InteractionResponse, PendingInteraction,
};
pub use pipeline::{ItemOutcome, SyncItem, SyncPipeline, SyncReport};
pub use pool::SharedPool;
pub use session::Session;
pub use sources::{BangumiSource, SearchHit, SearchSource};
pub use store::{JsonRecordStore, RecordStore, StoredRecord};
pub use subject::SubjectMatcher;
pub use taxonomy::{BrandRegistry, SourceTags, TagTaxonomy};
