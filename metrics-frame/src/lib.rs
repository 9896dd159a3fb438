//! Per-post metrics frame: one row per post with a fixed column order and
//! simple derived features. Pure and deterministic; no network calls.

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc};
use postlens_core::{EngagementCounts, Post, PostKind};
use serde::{Deserialize, Serialize};

/// Column order of the frame. Deterministic: exports and tables follow
/// this order exactly.
pub const COLUMNS: [&str; 17] = [
    "post_id",
    "text",
    "created_at",
    "hour",
    "day_of_week",
    "likes",
    "shares",
    "replies",
    "quotes",
    "engagement_score",
    "word_count",
    "kind",
    "category",
    "has_hashtags",
    "has_mentions",
    "has_links",
    "is_thread",
];

/// Weights for the composite engagement score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngagementWeights {
    pub like: f64,
    pub share: f64,
    pub reply: f64,
    pub quote: f64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            like: 1.0,
            share: 2.0,
            reply: 2.5,
            quote: 2.0,
        }
    }
}

impl EngagementWeights {
    pub fn score(&self, counts: &EngagementCounts) -> f64 {
        counts.likes as f64 * self.like
            + counts.shares as f64 * self.share
            + counts.replies as f64 * self.reply
            + counts.quotes as f64 * self.quote
    }
}

/// Keyword-derived topic bucket for a post's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContentCategory {
    Educational,
    Personal,
    Promotional,
    Opinion,
    News,
    General,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Educational => "Educational",
            ContentCategory::Personal => "Personal",
            ContentCategory::Promotional => "Promotional",
            ContentCategory::Opinion => "Opinion/Commentary",
            ContentCategory::News => "News/Updates",
            ContentCategory::General => "General",
        }
    }
}

const EDUCATIONAL_PATTERNS: &[&str] = &[
    "how to", "guide", "tutorial", "learn", "tip", "advice", "here's", "steps",
];
const PERSONAL_PATTERNS: &[&str] = &[
    "i ", "my ", "me ", "personal", "story", "experience", "feeling", "today",
];
const PROMOTIONAL_PATTERNS: &[&str] = &[
    "buy", "sale", "course", "product", "launch", "offer", "discount", "link in bio",
];
const OPINION_PATTERNS: &[&str] = &[
    "think", "believe", "opinion", "hot take", "unpopular", "controversial",
];
const NEWS_PATTERNS: &[&str] = &[
    "breaking", "just announced", "update", "news", "happening now",
];

pub fn categorize(text: &str) -> ContentCategory {
    let lower = text.to_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    if matches(EDUCATIONAL_PATTERNS) {
        ContentCategory::Educational
    } else if matches(PERSONAL_PATTERNS) {
        ContentCategory::Personal
    } else if matches(PROMOTIONAL_PATTERNS) {
        ContentCategory::Promotional
    } else if matches(OPINION_PATTERNS) {
        ContentCategory::Opinion
    } else if matches(NEWS_PATTERNS) {
        ContentCategory::News
    } else {
        ContentCategory::General
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn posting_hour(created_at: DateTime<Utc>, offset: FixedOffset) -> u32 {
    created_at.with_timezone(&offset).hour()
}

fn is_thread_opener(text: &str) -> bool {
    let head: String = text.chars().take(10).collect();
    text.starts_with("1/") || head.contains("1/")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub post_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub hour: u32,
    pub day_of_week: String,
    pub likes: u64,
    pub shares: u64,
    pub replies: u64,
    pub quotes: u64,
    pub engagement_score: f64,
    pub word_count: usize,
    pub kind: PostKind,
    pub category: ContentCategory,
    pub has_hashtags: bool,
    pub has_mentions: bool,
    pub has_links: bool,
    pub is_thread: bool,
}

impl MetricsRow {
    fn from_post(post: &Post, weights: &EngagementWeights, offset: FixedOffset) -> Self {
        let local = post.created_at.with_timezone(&offset);
        Self {
            post_id: post.id.clone(),
            text: post.text.clone(),
            created_at: post.created_at,
            hour: local.hour(),
            day_of_week: local.weekday().to_string(),
            likes: post.engagement.likes,
            shares: post.engagement.shares,
            replies: post.engagement.replies,
            quotes: post.engagement.quotes,
            engagement_score: weights.score(&post.engagement),
            word_count: word_count(&post.text),
            kind: post.kind,
            category: categorize(&post.text),
            has_hashtags: post.text.contains('#'),
            has_mentions: post.text.contains('@'),
            has_links: post.text.contains("http"),
            is_thread: is_thread_opener(&post.text),
        }
    }

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.post_id.clone(),
            self.text.clone(),
            self.created_at.to_rfc3339(),
            self.hour.to_string(),
            self.day_of_week.clone(),
            self.likes.to_string(),
            self.shares.to_string(),
            self.replies.to_string(),
            self.quotes.to_string(),
            format!("{:.1}", self.engagement_score),
            self.word_count.to_string(),
            self.kind.as_str().to_string(),
            self.category.as_str().to_string(),
            self.has_hashtags.to_string(),
            self.has_mentions.to_string(),
            self.has_links.to_string(),
            self.is_thread.to_string(),
        ]
    }
}

/// Aggregates for one content category, used in prompt interpolation and
/// in the console summary table.
#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub name: &'static str,
    pub count: usize,
    pub mean_engagement: f64,
    pub max_engagement: f64,
    pub top_excerpt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameSummary {
    pub total_posts: usize,
    pub first_post_at: Option<DateTime<Utc>>,
    pub last_post_at: Option<DateTime<Utc>>,
    pub mean_engagement: f64,
    pub median_engagement: f64,
    pub max_engagement: f64,
    pub categories: Vec<CategorySummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsFrame {
    rows: Vec<MetricsRow>,
}

impl MetricsFrame {
    /// Builds the frame with default weights and UTC hours.
    pub fn build(posts: &[Post]) -> Self {
        Self::build_with(posts, &EngagementWeights::default(), utc_offset())
    }

    pub fn build_with(posts: &[Post], weights: &EngagementWeights, offset: FixedOffset) -> Self {
        let rows = posts
            .iter()
            .map(|post| MetricsRow::from_post(post, weights, offset))
            .collect();
        Self { rows }
    }

    pub fn columns() -> &'static [&'static str] {
        &COLUMNS
    }

    pub fn rows(&self) -> &[MetricsRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows ranked by engagement score, highest first. Ties keep the
    /// original (newest-first) order.
    pub fn top_by_engagement(&self, n: usize) -> Vec<&MetricsRow> {
        let mut ranked: Vec<&MetricsRow> = self.rows.iter().collect();
        ranked.sort_by(|a, b| {
            b.engagement_score
                .partial_cmp(&a.engagement_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(n);
        ranked
    }

    pub fn summary(&self) -> FrameSummary {
        let mut scores: Vec<f64> = self.rows.iter().map(|r| r.engagement_score).collect();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mean = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        let median = match scores.len() {
            0 => 0.0,
            n if n % 2 == 1 => scores[n / 2],
            n => (scores[n / 2 - 1] + scores[n / 2]) / 2.0,
        };
        let max = scores.last().copied().unwrap_or(0.0);

        FrameSummary {
            total_posts: self.rows.len(),
            first_post_at: self.rows.iter().map(|r| r.created_at).min(),
            last_post_at: self.rows.iter().map(|r| r.created_at).max(),
            mean_engagement: mean,
            median_engagement: median,
            max_engagement: max,
            categories: self.category_summaries(),
        }
    }

    fn category_summaries(&self) -> Vec<CategorySummary> {
        use ContentCategory::*;
        let mut summaries = Vec::new();
        for category in [Educational, Personal, Promotional, Opinion, News, General] {
            let rows: Vec<&MetricsRow> =
                self.rows.iter().filter(|r| r.category == category).collect();
            if rows.is_empty() {
                continue;
            }
            let mean = rows.iter().map(|r| r.engagement_score).sum::<f64>() / rows.len() as f64;
            let top = rows.iter().max_by(|a, b| {
                a.engagement_score
                    .partial_cmp(&b.engagement_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            if let Some(top) = top {
                summaries.push(CategorySummary {
                    name: category.as_str(),
                    count: rows.len(),
                    mean_engagement: mean,
                    max_engagement: top.engagement_score,
                    top_excerpt: excerpt(&top.text, 100),
                });
            }
        }
        summaries
    }

    /// Deterministic CSV export: the header is always the full column set,
    /// even for an empty frame.
    pub fn to_csv(&self) -> String {
        let mut out = COLUMNS.join(",");
        out.push('\n');
        for row in &self.rows {
            let fields: Vec<String> = row.csv_fields().iter().map(|f| csv_escape(f)).collect();
            out.push_str(&fields.join(","));
            out.push('\n');
        }
        out
    }
}

pub fn utc_offset() -> FixedOffset {
    Utc.fix()
}

pub fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(id: &str, text: &str, likes: u64, shares: u64, replies: u64, quotes: u64) -> Post {
        Post {
            id: id.to_string(),
            author_handle: "tester".to_string(),
            text: text.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 14, 30, 0).unwrap(),
            engagement: EngagementCounts {
                likes,
                shares,
                replies,
                quotes,
            },
            kind: PostKind::Original,
        }
    }

    #[test]
    fn word_count_splits_on_whitespace() {
        assert_eq!(word_count("hello world"), 2);
        assert_eq!(word_count("  spaced   out  "), 2);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn posting_hour_defaults_to_utc() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 14, 30, 0).unwrap();
        assert_eq!(posting_hour(ts, utc_offset()), 14);
    }

    #[test]
    fn posting_hour_honours_caller_offset() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 14, 30, 0).unwrap();
        let plus_three = FixedOffset::east_opt(3 * 3600).unwrap();
        assert_eq!(posting_hour(ts, plus_three), 17);
    }

    #[test]
    fn engagement_score_uses_configured_weights() {
        let weights = EngagementWeights::default();
        let counts = EngagementCounts {
            likes: 10,
            shares: 2,
            replies: 1,
            quotes: 0,
        };
        assert_eq!(weights.score(&counts), 16.5);
    }

    #[test]
    fn empty_input_yields_empty_frame_with_full_columns() {
        let frame = MetricsFrame::build(&[]);
        assert!(frame.is_empty());
        assert_eq!(MetricsFrame::columns().len(), COLUMNS.len());

        let csv = frame.to_csv();
        let header = csv.lines().next().unwrap();
        assert_eq!(header.split(',').count(), COLUMNS.len());
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn build_is_deterministic() {
        let posts = vec![
            post("1", "how to write a guide", 10, 2, 1, 0),
            post("2", "my personal story", 3, 0, 0, 1),
        ];
        let a = MetricsFrame::build(&posts);
        let b = MetricsFrame::build(&posts);
        assert_eq!(a, b);
        assert_eq!(a.to_csv(), b.to_csv());
    }

    #[test]
    fn rows_carry_derived_features() {
        let posts = vec![post(
            "1",
            "1/ How to grow: check https://example.com #growth @friend",
            10,
            2,
            1,
            0,
        )];
        let frame = MetricsFrame::build(&posts);
        let row = &frame.rows()[0];

        assert_eq!(row.hour, 14);
        assert_eq!(row.engagement_score, 16.5);
        assert_eq!(row.category, ContentCategory::Educational);
        assert!(row.has_hashtags);
        assert!(row.has_mentions);
        assert!(row.has_links);
        assert!(row.is_thread);
        assert_eq!(row.day_of_week, "Sat");
    }

    #[test]
    fn top_by_engagement_ranks_descending() {
        let posts = vec![
            post("low", "quiet one", 1, 0, 0, 0),
            post("high", "popular one", 100, 10, 5, 2),
            post("mid", "average one", 10, 1, 0, 0),
        ];
        let frame = MetricsFrame::build(&posts);
        let top = frame.top_by_engagement(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].post_id, "high");
        assert_eq!(top[1].post_id, "mid");
    }

    #[test]
    fn summary_aggregates_by_category() {
        let posts = vec![
            post("1", "how to do a thing", 10, 0, 0, 0),
            post("2", "how to do another thing", 20, 0, 0, 0),
            post("3", "breaking news about stuff", 5, 0, 0, 0),
        ];
        let frame = MetricsFrame::build(&posts);
        let summary = frame.summary();

        assert_eq!(summary.total_posts, 3);
        assert_eq!(summary.max_engagement, 20.0);

        let educational = summary
            .categories
            .iter()
            .find(|c| c.name == "Educational")
            .unwrap();
        assert_eq!(educational.count, 2);
        assert_eq!(educational.mean_engagement, 15.0);
        assert_eq!(educational.max_engagement, 20.0);
    }

    #[test]
    fn median_handles_even_and_odd_counts() {
        let posts = vec![
            post("1", "a", 1, 0, 0, 0),
            post("2", "b", 3, 0, 0, 0),
            post("3", "c", 5, 0, 0, 0),
        ];
        assert_eq!(MetricsFrame::build(&posts).summary().median_engagement, 3.0);

        let posts = vec![post("1", "a", 1, 0, 0, 0), post("2", "b", 3, 0, 0, 0)];
        assert_eq!(MetricsFrame::build(&posts).summary().median_engagement, 2.0);
    }

    #[test]
    fn csv_escapes_commas_and_quotes() {
        let posts = vec![post("1", "hello, \"world\"", 1, 0, 0, 0)];
        let csv = MetricsFrame::build(&posts).to_csv();
        assert!(csv.contains("\"hello, \"\"world\"\"\""));
    }

    #[test]
    fn categorize_matches_keyword_buckets() {
        assert_eq!(categorize("How to ship faster"), ContentCategory::Educational);
        assert_eq!(categorize("Launch day! Buy the course"), ContentCategory::Promotional);
        assert_eq!(categorize("hot take: tabs beat spaces"), ContentCategory::Opinion);
        assert_eq!(categorize("breaking: something happened"), ContentCategory::News);
        assert_eq!(categorize("nothing special here"), ContentCategory::General);
    }

    #[test]
    fn zero_engagement_scores_zero() {
        let posts = vec![post("1", "quiet", 0, 0, 0, 0)];
        let frame = MetricsFrame::build(&posts);
        assert_eq!(frame.rows()[0].engagement_score, 0.0);
    }
}
