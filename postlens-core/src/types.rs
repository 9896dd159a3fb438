use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Content type of a post, derived from the API's referenced-tweet flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Original,
    Reply,
    Repost,
    Quote,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Original => "original",
            PostKind::Reply => "reply",
            PostKind::Repost => "repost",
            PostKind::Quote => "quote",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub likes: u64,
    pub shares: u64,
    pub replies: u64,
    pub quotes: u64,
}

impl EngagementCounts {
    pub fn total(&self) -> u64 {
        self.likes + self.shares + self.replies + self.quotes
    }
}

/// A single fetched post. Immutable once constructed by the fetch client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_handle: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub engagement: EngagementCounts,
    pub kind: PostKind,
}

/// Everything fetched for one profile in one run. Built once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub handle: String,
    pub posts: Vec<Post>,
    pub replies: Vec<Post>,
    pub fetched_at: DateTime<Utc>,
}

impl ProfileSnapshot {
    pub fn new(handle: String, posts: Vec<Post>, replies: Vec<Post>) -> Self {
        Self {
            handle,
            posts,
            replies,
            fetched_at: Utc::now(),
        }
    }
}

/// One analysis section as returned by the model. The model is asked for
/// JSON but free text is accepted and preserved verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "content", rename_all = "lowercase")]
pub enum AnalysisPayload {
    Structured(serde_json::Map<String, serde_json::Value>),
    Raw(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Standard,
    Enhanced,
}

/// The outcome of one analysis run. A category missing from `sections`
/// and present in `failures` means that analysis step failed; it is
/// reported, never silently defaulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub handle: String,
    pub mode: AnalysisMode,
    pub generated_at: DateTime<Utc>,
    pub sections: BTreeMap<String, AnalysisPayload>,
    pub failures: BTreeMap<String, String>,
}

impl AnalysisReport {
    pub fn new(handle: String, mode: AnalysisMode) -> Self {
        Self {
            handle,
            mode,
            generated_at: Utc::now(),
            sections: BTreeMap::new(),
            failures: BTreeMap::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Metadata persisted alongside the analysis JSON export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub handle: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub post_count: usize,
    pub reply_count: usize,
    pub requests_issued: u64,
    pub rate_limit_waits: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engagement_total_sums_all_counts() {
        let counts = EngagementCounts {
            likes: 10,
            shares: 2,
            replies: 1,
            quotes: 0,
        };
        assert_eq!(counts.total(), 13);
    }

    #[test]
    fn payload_serializes_as_tagged_variant() {
        let payload = AnalysisPayload::Raw("plain text".to_string());
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["format"], "raw");
        assert_eq!(json["content"], "plain text");
    }

    #[test]
    fn report_tracks_partial_completion() {
        let mut report = AnalysisReport::new("someone".to_string(), AnalysisMode::Enhanced);
        assert!(report.is_complete());
        report
            .failures
            .insert("themes".to_string(), "timeout".to_string());
        assert!(!report.is_complete());
    }
}
