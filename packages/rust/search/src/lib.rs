//! Google Custom Search client: the context-enrichment collaborator.
//!
//! Enrichment is best-effort: callers are expected to collapse any error
//! from [`SearchClient::search`] into an empty snippet list and keep going.
//! Nothing in the answer pipeline may fail because a search failed.

use serde::Deserialize;
use tracing::{debug, instrument};

use answerforge_shared::{
    AnswerForgeError, GOOGLE_CSE_ORIGIN, Result, SearchConfig, SearchSnippet,
};

/// Hard provider cap on results per request, regardless of what was asked for.
pub const PROVIDER_MAX_RESULTS: usize = 10;

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("AnswerForge/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Response shape
// ---------------------------------------------------------------------------

/// Subset of the Custom Search response we consume. `items` is absent when
/// the query matched nothing.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

// ---------------------------------------------------------------------------
// SearchClient
// ---------------------------------------------------------------------------

/// HTTP client for the Custom Search JSON API.
pub struct SearchClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
}

impl SearchClient {
    /// Build a client from config plus resolved credentials.
    pub fn new(config: &SearchConfig, api_key: String, engine_id: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()
            .map_err(|e| AnswerForgeError::Search(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            engine_id,
        })
    }

    /// Search for `query`, returning up to `max_results` snippets
    /// (capped at the provider limit of 10).
    #[instrument(skip_all, fields(max_results))]
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchSnippet>> {
        let num = max_results.min(PROVIDER_MAX_RESULTS).to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AnswerForgeError::Search(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnswerForgeError::Search(format!("HTTP {status}")));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AnswerForgeError::Search(format!("invalid response body: {e}")))?;

        let snippets: Vec<SearchSnippet> = body
            .items
            .into_iter()
            .map(|item| SearchSnippet {
                title: item.title,
                excerpt: item.snippet,
                source_url: item.link,
                origin: GOOGLE_CSE_ORIGIN.into(),
            })
            .collect();

        debug!(count = snippets.len(), "search results received");
        Ok(snippets)
    }
}
