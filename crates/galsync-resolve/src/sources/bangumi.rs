use std::time::Duration;

use async_trait::async_trait;
use galsync_core::config::MetadataApiConfig;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::http::RateLimitedClient;
use crate::sources::{SearchHit, SearchSource};

/// Subject type of games in the Bangumi API.
const GAME_SUBJECT_TYPE: u32 = 4;
const SUBJECT_PAGE_URL: &str = "https://bangumi.tv/subject";

/// Bangumi subject search (`POST /v0/search/subjects`), restricted to games.
pub struct BangumiSource {
    client: RateLimitedClient,
    base_url: String,
    token: Option<String>,
}

impl BangumiSource {
    /// Build from config. The access token is read from the environment
    /// variable named by `token_env`; a missing token is a fatal config error.
    pub fn from_config(config: &MetadataApiConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ResolveError::Config(format!(
                    "metadata API token missing: set {}",
                    config.token_env
                ))
            })?;
        Self::with_config(
            config.base_url.clone(),
            Some(token),
            Duration::from_millis(config.min_interval_ms),
            &config.user_agent,
        )
    }

    fn with_config(
        base_url: String,
        token: Option<String>,
        min_interval: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new(min_interval, 2, user_agent)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_tests(base_url: String, token: Option<String>) -> Self {
        let mut source = Self::with_config(base_url, token, Duration::from_millis(1), "galsync-test")
            .expect("test client");
        source.client = source.client.with_backoff_unit(Duration::from_millis(1));
        source
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ResolveError::Config(format!("invalid token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

fn hit_from_json(v: &Value) -> Option<SearchHit> {
    let id = match v.get("id")? {
        Value::Number(n) => n.to_string(),
        Value::String(s) if !s.is_empty() => s.clone(),
        _ => return None,
    };
    let primary_name = v
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let localized_name = v
        .get("name_cn")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned);

    Some(SearchHit {
        url: Some(format!("{SUBJECT_PAGE_URL}/{id}")),
        id,
        primary_name,
        localized_name,
    })
}

#[async_trait]
impl SearchSource for BangumiSource {
    fn name(&self) -> &str {
        "bangumi"
    }

    async fn search(&self, keyword: &str) -> Result<Vec<SearchHit>> {
        let url = format!("{}/v0/search/subjects", self.base_url);
        let payload = json!({
            "keyword": keyword,
            "sort": "rank",
            "filter": { "type": [GAME_SUBJECT_TYPE], "nsfw": true },
        });
        let body: Value = self.client.post_json(&url, &payload, self.headers()?).await?;

        let hits: Vec<SearchHit> = body
            .get("data")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(hit_from_json).collect())
            .unwrap_or_default();
        debug!(keyword, hits = hits.len(), "bangumi search");
        Ok(hits)
    }
}
