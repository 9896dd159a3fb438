//! Prompt templates. Each builder returns the user message for one
//! analysis section; the section name doubles as the report key.

use metrics_frame::{FrameSummary, MetricsRow};
use postlens_core::AnalysisPayload;
use std::collections::BTreeMap;
use std::fmt::Write;

pub const SYSTEM_STRATEGIST: &str = "You are an expert social media content strategist with a \
deep understanding of viral content patterns and audience psychology. Answer with a single \
JSON object whose keys are short snake_case section names and whose values are your findings.";

/// Renders the frame summary into the performance-data block shared by
/// several prompts.
pub fn performance_data(summary: &FrameSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total posts analyzed: {}", summary.total_posts);
    let _ = writeln!(
        out,
        "Engagement score: mean {:.1}, median {:.1}, max {:.1}",
        summary.mean_engagement, summary.median_engagement, summary.max_engagement
    );
    for category in &summary.categories {
        let _ = writeln!(
            out,
            "- {} ({} posts): mean engagement {:.1}, best {:.1}, top post: \"{}\"",
            category.name,
            category.count,
            category.mean_engagement,
            category.max_engagement,
            category.top_excerpt
        );
    }
    out
}

pub fn content_strategy(handle: &str, summary: &FrameSummary) -> String {
    format!(
        "You are analyzing @{handle}'s content performance.\n\n\
         CONTENT PERFORMANCE DATA:\n{data}\n\
         Provide a comprehensive content strategy analysis covering:\n\n\
         1. CONTENT TYPE EFFECTIVENESS\n\
         - Which content categories perform best and why\n\
         - Audience preferences and engagement patterns\n\
         - Content gaps and missed opportunities\n\n\
         2. CONTENT OPTIMIZATION INSIGHTS\n\
         - What makes their best content work\n\
         - Specific elements that drive engagement\n\
         - Writing style and format analysis\n\n\
         3. STRATEGIC RECOMMENDATIONS\n\
         - Immediate content adjustments for the next 7 days\n\
         - Content calendar suggestions\n\
         - Specific content ideas based on what works\n\n\
         4. COMPETITIVE POSITIONING\n\
         - How this strategy compares to successful creators\n\
         - Unique angles to leverage\n\
         - Areas for differentiation\n\n\
         Be specific, actionable, and focus on insights that can immediately \
         improve content performance.",
        data = performance_data(summary)
    )
}

pub fn themes(handle: &str, excerpts: &[String]) -> String {
    format!(
        "Analyze the following posts from @{handle} and identify the main themes and topics:\n\n\
         {posts}\n\n\
         Provide a detailed analysis of:\n\
         1. Main themes and topics\n\
         2. Content patterns and styles\n\
         3. Audience engagement insights\n\
         4. Writing style characteristics",
        posts = bullet_list(excerpts)
    )
}

pub fn engagement_patterns(handle: &str, top_rows: &[&MetricsRow]) -> String {
    let rows: Vec<serde_json::Value> = top_rows
        .iter()
        .map(|row| {
            serde_json::json!({
                "text": row.text,
                "engagement_score": row.engagement_score,
                "likes": row.likes,
                "shares": row.shares,
                "replies": row.replies,
            })
        })
        .collect();
    let data = serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string());

    format!(
        "Analyze the engagement patterns for @{handle} based on this data:\n\n\
         {data}\n\n\
         Identify:\n\
         1. What content gets the highest engagement and why\n\
         2. Patterns in successful content\n\
         3. Optimization opportunities"
    )
}

pub fn hook_lines(handle: &str, excerpts: &[String]) -> String {
    format!(
        "Study the opening lines of these posts from @{handle}:\n\n\
         {posts}\n\n\
         What are the common hook lines and opening strategies used? Which \
         openings correlate with stronger engagement, and what formats \
         (questions, numbers, threads) appear most effective?",
        posts = bullet_list(excerpts)
    )
}

pub fn reply_behavior(handle: &str, reply_excerpts: &[String]) -> String {
    if reply_excerpts.is_empty() {
        return format!(
            "No recent replies from @{handle} were available. Based on that \
             absence alone, assess what their reply behavior suggests about \
             community engagement, and recommend a reply strategy."
        );
    }
    format!(
        "These are recent replies @{handle} posted in other conversations:\n\n\
         {posts}\n\n\
         Analyze their reply behavior:\n\
         1. Tone and style when engaging with others\n\
         2. Reply strategies that build community\n\
         3. Missed engagement opportunities",
        posts = bullet_list(reply_excerpts)
    )
}

pub fn recommendations(handle: &str, sections: &BTreeMap<String, AnalysisPayload>) -> String {
    let mut combined = String::new();
    for (name, payload) in sections {
        let rendered = match payload {
            AnalysisPayload::Structured(map) => {
                serde_json::to_string(map).unwrap_or_default()
            }
            AnalysisPayload::Raw(text) => text.clone(),
        };
        let _ = writeln!(combined, "**{name}**\n{rendered}\n");
    }

    format!(
        "Based on the comprehensive content analysis for @{handle}:\n\n\
         ANALYSIS RESULTS:\n{combined}\n\
         Provide specific, actionable content recommendations including:\n\n\
         1. IMMEDIATE ACTIONS (next 7 days)\n\
         - Specific content types to create\n\
         - Optimal posting times and formats\n\
         - Reply strategies to improve engagement\n\n\
         2. CONTENT STRATEGY (next 30 days)\n\
         - Theme focus areas\n\
         - Content calendar suggestions\n\
         - Community building tactics\n\n\
         3. LONG-TERM GROWTH (3-6 months)\n\
         - Brand positioning improvements\n\
         - Audience expansion strategies\n\
         - Content differentiation opportunities\n\n\
         Be specific and reference actual patterns from the analysis."
    )
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
