use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One subject returned by a metadata search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub primary_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localized_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SearchHit {
    pub fn new(id: impl Into<String>, primary_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            primary_name: primary_name.into(),
            localized_name: None,
            url: None,
        }
    }

    pub fn with_localized(mut self, name: impl Into<String>) -> Self {
        self.localized_name = Some(name.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// A storefront or metadata API that can be searched by keyword.
/// An empty result is a legitimate answer.
#[async_trait]
pub trait SearchSource: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, keyword: &str) -> Result<Vec<SearchHit>>;
}

pub mod bangumi;

pub use bangumi::BangumiSource;
