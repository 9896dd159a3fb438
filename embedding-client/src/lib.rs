//! Embedding-based selection of representative posts. Used when a
//! category has more posts than fit in a prompt: posts are embedded,
//! grouped by cosine similarity, and one exemplar per group is kept.

use postlens_core::{AppConfig, CoreError, EmbeddingError};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const EMBEDDING_API_BASE: &str = "https://api.openai.com";
const EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Cosine similarity above which two posts are considered to cover the
/// same ground and only one of them is kept.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.82;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'static str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Greedy grouping: each vector joins the first existing group whose
/// exemplar (the group's first member) it is similar enough to, otherwise
/// it opens a new group. Returns groups of input indices, in first-seen
/// order, so results are deterministic for a given input order.
pub fn group_by_similarity(vectors: &[Vec<f32>], threshold: f32) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (index, vector) in vectors.iter().enumerate() {
        let home = groups
            .iter_mut()
            .find(|group| cosine_similarity(&vectors[group[0]], vector) >= threshold);
        match home {
            Some(group) => group.push(index),
            None => groups.push(vec![index]),
        }
    }
    groups
}

/// Client for the embeddings endpoint of the LLM provider.
#[derive(Debug)]
pub struct EmbeddingClient {
    http_client: Client,
    base_url: Url,
    api_key: String,
    threshold: f32,
}

impl EmbeddingClient {
    pub fn new(config: &AppConfig) -> Result<Self, CoreError> {
        Self::with_base_url(
            &config.llm_api_key,
            config.request_timeout_secs,
            &config.llm_api_base,
        )
    }

    /// Client with a custom base URL, for pointing at a mock server in tests.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent("postlens/0.1")
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| CoreError::InvalidInput {
            message: format!("invalid embedding API base URL '{base_url}': {e}"),
        })?;

        Ok(Self {
            http_client,
            base_url,
            api_key: api_key.to_string(),
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        })
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn default_base_url() -> &'static str {
        EMBEDDING_API_BASE
    }

    /// Embeds a batch of texts in one request. The returned vectors are
    /// in input order regardless of the order the API answers in.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let url = self
            .base_url
            .join("v1/embeddings")
            .map_err(|e| EmbeddingError::RequestFailed {
                reason: format!("failed to build embeddings URL: {e}"),
            })?;

        let request = EmbeddingRequest {
            model: EMBEDDING_MODEL,
            input: texts,
        };

        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_error_status(status));
        }

        let body: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| EmbeddingError::RequestFailed {
                    reason: format!("failed to parse embeddings response: {e}"),
                })?;

        if body.data.len() != texts.len() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: texts.len(),
                actual: body.data.len(),
            });
        }

        let mut data = body.data;
        data.sort_by_key(|d| d.index);
        debug!("embedded {} text(s)", data.len());
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    /// Picks up to `max_count` representative texts. Texts are grouped by
    /// similarity and the first member of each group is kept, preserving
    /// input order (which is newest-first for timeline excerpts). If the
    /// embedding call fails the first `max_count` texts are returned
    /// instead; selection quality degrades, the analysis does not abort.
    pub async fn select_representatives(
        &self,
        texts: &[String],
        max_count: usize,
    ) -> Vec<String> {
        if texts.len() <= max_count {
            return texts.to_vec();
        }

        match self.embed(texts).await {
            Ok(vectors) => {
                let groups = group_by_similarity(&vectors, self.threshold);
                debug!(
                    "grouped {} text(s) into {} similarity group(s)",
                    texts.len(),
                    groups.len()
                );
                groups
                    .iter()
                    .take(max_count)
                    .map(|group| texts[group[0]].clone())
                    .collect()
            }
            Err(e) => {
                warn!("embedding selection unavailable, falling back to recency: {e}");
                texts.iter().take(max_count).cloned().collect()
            }
        }
    }
}

fn map_error_status(status: StatusCode) -> EmbeddingError {
    EmbeddingError::RequestFailed {
        reason: format!("embeddings endpoint returned {status}"),
    }
}
