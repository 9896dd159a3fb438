//! The analysis orchestrator: builds prompts from the metrics frame,
//! runs them through a `ChatCompleter` and collects an `AnalysisReport`.
//! One failed section never aborts its siblings.

use crate::llm::ChatCompleter;
use crate::prompts;
use embedding_client::EmbeddingClient;
use metrics_frame::{excerpt, MetricsFrame};
use postlens_core::{AnalysisMode, AnalysisPayload, AnalysisReport, Post};
use tracing::{info, warn};

const EXCERPT_CHARS: usize = 240;

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub mode: AnalysisMode,
    /// Cap on post excerpts interpolated into a single prompt.
    pub max_excerpts: usize,
    /// Cap on reply excerpts for the reply-behavior section.
    pub max_reply_excerpts: usize,
    /// Rows shown in the engagement-patterns data block.
    pub top_rows: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::Standard,
            max_excerpts: 10,
            max_reply_excerpts: 5,
            top_rows: 5,
        }
    }
}

impl AnalysisOptions {
    pub fn enhanced() -> Self {
        Self {
            mode: AnalysisMode::Enhanced,
            ..Self::default()
        }
    }
}

pub struct AnalysisAgent<C: ChatCompleter> {
    completer: C,
    embeddings: Option<EmbeddingClient>,
    options: AnalysisOptions,
}

impl<C: ChatCompleter> AnalysisAgent<C> {
    pub fn new(completer: C, options: AnalysisOptions) -> Self {
        Self {
            completer,
            embeddings: None,
            options,
        }
    }

    /// Enables the embedding pass that dedups near-identical excerpts
    /// before they are interpolated into prompts.
    pub fn with_embeddings(mut self, embeddings: EmbeddingClient) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    pub async fn analyze(
        &self,
        handle: &str,
        frame: &MetricsFrame,
        replies: &[Post],
    ) -> AnalysisReport {
        let mut report = AnalysisReport::new(handle.to_string(), self.options.mode);

        match self.options.mode {
            AnalysisMode::Standard => self.run_standard(handle, frame, &mut report).await,
            AnalysisMode::Enhanced => self.run_enhanced(handle, frame, replies, &mut report).await,
        }

        info!(
            "analysis for @{} finished: {} section(s), {} failure(s)",
            handle,
            report.sections.len(),
            report.failures.len()
        );
        report
    }

    async fn run_standard(&self, handle: &str, frame: &MetricsFrame, report: &mut AnalysisReport) {
        let prompt = prompts::content_strategy(handle, &frame.summary());
        self.run_section(report, "content_strategy", &prompt).await;
    }

    async fn run_enhanced(
        &self,
        handle: &str,
        frame: &MetricsFrame,
        replies: &[Post],
        report: &mut AnalysisReport,
    ) {
        let excerpts = self.post_excerpts(frame).await;
        let reply_excerpts: Vec<String> = replies
            .iter()
            .take(self.options.max_reply_excerpts)
            .map(|post| excerpt(&post.text, EXCERPT_CHARS))
            .collect();
        let top = frame.top_by_engagement(self.options.top_rows);

        self.run_section(report, "themes", &prompts::themes(handle, &excerpts))
            .await;
        self.run_section(
            report,
            "engagement_patterns",
            &prompts::engagement_patterns(handle, &top),
        )
        .await;
        self.run_section(report, "hook_lines", &prompts::hook_lines(handle, &excerpts))
            .await;
        self.run_section(
            report,
            "reply_behavior",
            &prompts::reply_behavior(handle, &reply_excerpts),
        )
        .await;

        // The roll-up interpolates whatever sections completed.
        let prompt = prompts::recommendations(handle, &report.sections);
        self.run_section(report, "recommendations", &prompt).await;
    }

    /// Post texts for prompt interpolation, deduped by embedding
    /// similarity when an embedding client is configured.
    async fn post_excerpts(&self, frame: &MetricsFrame) -> Vec<String> {
        let texts: Vec<String> = frame
            .rows()
            .iter()
            .map(|row| excerpt(&row.text, EXCERPT_CHARS))
            .collect();

        match &self.embeddings {
            Some(client) => {
                client
                    .select_representatives(&texts, self.options.max_excerpts)
                    .await
            }
            None => texts.into_iter().take(self.options.max_excerpts).collect(),
        }
    }

    async fn run_section(&self, report: &mut AnalysisReport, name: &str, prompt: &str) {
        match self.completer.complete(prompts::SYSTEM_STRATEGIST, prompt).await {
            Ok(text) => {
                report
                    .sections
                    .insert(name.to_string(), parse_payload(&text));
            }
            Err(e) => {
                warn!("analysis section '{name}' failed: {e}");
                report.failures.insert(name.to_string(), e.to_string());
            }
        }
    }
}

/// Interprets a model reply: a JSON object (optionally inside a Markdown
/// code fence) becomes a structured payload, anything else is preserved
/// as raw text.
pub fn parse_payload(text: &str) -> AnalysisPayload {
    let stripped = strip_code_fence(text.trim());
    match serde_json::from_str::<serde_json::Value>(stripped) {
        Ok(serde_json::Value::Object(map)) => AnalysisPayload::Structured(map),
        _ => AnalysisPayload::Raw(text.trim().to_string()),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json", usually) up to the first newline.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => return text,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatCompleter;
    use postlens_core::{EngagementCounts, LlmError, PostKind};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a scripted sequence of replies and records each prompt.
    struct ScriptedCompleter {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        prompts_seen: Mutex<Vec<String>>,
    }

    impl ScriptedCompleter {
        fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts_seen: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts_seen.lock().unwrap().clone()
        }
    }

    impl ChatCompleter for ScriptedCompleter {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, LlmError> {
            self.prompts_seen.lock().unwrap().push(user.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("unscripted".to_string()))
        }
    }

    fn unavailable(category: &str) -> Result<String, LlmError> {
        Err(LlmError::AnalysisUnavailable {
            category: category.to_string(),
            reason: "scripted failure".to_string(),
        })
    }

    fn post(text: &str, likes: u64) -> Post {
        Post {
            id: "1".to_string(),
            author_handle: "tester".to_string(),
            text: text.to_string(),
            created_at: chrono::Utc::now(),
            engagement: EngagementCounts {
                likes,
                ..Default::default()
            },
            kind: PostKind::Original,
        }
    }

    fn frame() -> MetricsFrame {
        MetricsFrame::build(&[post("how to write rust", 10), post("my day today", 3)])
    }

    #[test]
    fn parse_payload_accepts_plain_json_objects() {
        let payload = parse_payload(r#"{"themes": ["rust"]}"#);
        assert!(matches!(payload, AnalysisPayload::Structured(_)));
    }

    #[test]
    fn parse_payload_strips_markdown_fences() {
        let fenced = "```json\n{\"key\": \"value\"}\n```";
        match parse_payload(fenced) {
            AnalysisPayload::Structured(map) => assert_eq!(map["key"], "value"),
            other => panic!("expected structured payload, got {other:?}"),
        }
    }

    #[test]
    fn parse_payload_preserves_free_text() {
        let payload = parse_payload("Your content leans educational.");
        assert_eq!(
            payload,
            AnalysisPayload::Raw("Your content leans educational.".to_string())
        );
    }

    #[test]
    fn parse_payload_treats_json_arrays_as_raw() {
        assert!(matches!(parse_payload("[1, 2]"), AnalysisPayload::Raw(_)));
    }

    #[tokio::test]
    async fn standard_mode_issues_one_consolidated_request() {
        let completer = ScriptedCompleter::new(vec![Ok("solid strategy".to_string())]);
        let agent = AnalysisAgent::new(completer, AnalysisOptions::default());

        let report = agent.analyze("alice", &frame(), &[]).await;

        assert!(report.is_complete());
        assert_eq!(report.sections.len(), 1);
        assert!(matches!(
            report.sections["content_strategy"],
            AnalysisPayload::Raw(_)
        ));
        let prompts = agent.completer.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("@alice"));
    }

    #[tokio::test]
    async fn enhanced_mode_covers_every_category_plus_recommendations() {
        let completer = ScriptedCompleter::new(vec![
            Ok(r#"{"themes": ["rust"]}"#.to_string()),
            Ok("engagement findings".to_string()),
            Ok("hook findings".to_string()),
            Ok("reply findings".to_string()),
            Ok("do more rust threads".to_string()),
        ]);
        let agent = AnalysisAgent::new(completer, AnalysisOptions::enhanced());

        let report = agent.analyze("bob", &frame(), &[post("nice thread!", 1)]).await;

        assert!(report.is_complete());
        let keys: Vec<&str> = report.sections.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "engagement_patterns",
                "hook_lines",
                "recommendations",
                "reply_behavior",
                "themes"
            ]
        );
        // The roll-up prompt interpolates the completed sections.
        let prompts = agent.completer.prompts();
        assert!(prompts[4].contains("**themes**"));
        assert!(prompts[4].contains("reply findings"));
    }

    #[tokio::test]
    async fn one_failed_category_never_aborts_the_others() {
        let completer = ScriptedCompleter::new(vec![
            unavailable("themes"),
            Ok("engagement findings".to_string()),
            Ok("hook findings".to_string()),
            Ok("reply findings".to_string()),
            Ok("recommendations text".to_string()),
        ]);
        let agent = AnalysisAgent::new(completer, AnalysisOptions::enhanced());

        let report = agent.analyze("carol", &frame(), &[]).await;

        assert!(!report.is_complete());
        assert!(report.failures.contains_key("themes"));
        assert_eq!(report.sections.len(), 4);
        assert!(report.sections.contains_key("recommendations"));
    }

    #[tokio::test]
    async fn all_failures_still_return_a_report() {
        let completer = ScriptedCompleter::new(vec![
            unavailable("themes"),
            unavailable("engagement_patterns"),
            unavailable("hook_lines"),
            unavailable("reply_behavior"),
            unavailable("recommendations"),
        ]);
        let agent = AnalysisAgent::new(completer, AnalysisOptions::enhanced());

        let report = agent.analyze("dave", &frame(), &[]).await;

        assert!(report.sections.is_empty());
        assert_eq!(report.failures.len(), 5);
    }
}
