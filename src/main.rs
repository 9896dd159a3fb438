use analysis_agent::{AnalysisAgent, AnalysisOptions, OpenAiChat};
use chrono::Utc;
use clap::Parser;
use embedding_client::EmbeddingClient;
use metrics_frame::MetricsFrame;
use postlens_core::{
    AnalysisMode, AppConfig, CoreError, ErrorExt, Post, ProfileSnapshot, RunMetadata,
};
use profile_client::ProfileClient;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info, warn};
use uuid::Uuid;

const RESULTS_DIR: &str = "results";

#[derive(Debug, Parser)]
#[command(name = "postlens")]
#[command(version, about = "Analyze a public X profile's content with AI-powered insights")]
struct Cli {
    /// Profile handle to analyze (with or without a leading @)
    handle: String,

    /// Number of posts to fetch
    #[arg(short = 't', long = "posts", default_value_t = 20)]
    posts: usize,

    /// Number of recent replies to fetch
    #[arg(short = 'r', long = "replies", default_value_t = 10)]
    replies: usize,

    /// Skip the per-category enhanced analysis
    #[arg(long)]
    standard_only: bool,

    /// Save the analysis JSON and metrics CSV under results/
    #[arg(long)]
    save: bool,

    /// Render the hour-of-day engagement chart
    #[arg(long)]
    charts: bool,

    /// Per-request HTTP timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postlens=info,profile_client=info,analysis_agent=info".into()),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            e.log_error();
            eprintln!("[{}] {}", e.error_code(), e.user_friendly_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CoreError> {
    let handle = normalise_handle(&cli.handle)?;
    let started_at = Utc::now();

    let mut config = AppConfig::from_env()?;
    if let Some(timeout) = cli.timeout_secs {
        config.request_timeout_secs = timeout;
    }

    print!("{}", report::banner());
    println!("Analyzing @{handle}\n");

    let client = ProfileClient::new(&config)?;
    info!("fetching up to {} post(s) for @{}", cli.posts, handle);
    let posts = client.fetch_posts(&handle, cli.posts).await?;
    if posts.is_empty() {
        return Err(CoreError::InvalidInput {
            message: format!("no posts found for @{handle}; nothing to analyze"),
        });
    }
    println!("Fetched {} post(s)", posts.len());

    // A failed reply fetch degrades to an empty set; the posts are
    // already in hand and the main analysis can proceed without replies.
    let replies = fetch_replies_best_effort(&client, &handle, cli.replies).await;
    if !replies.is_empty() {
        println!("Fetched {} repl(y/ies)", replies.len());
    }
    let snapshot = ProfileSnapshot::new(handle.clone(), posts, replies);

    let frame = MetricsFrame::build(&snapshot.posts);
    let report_doc = analyze(&config, &handle, &frame, &snapshot.replies, cli.standard_only).await?;

    println!("\n{}", report::render_frame_excerpt(&frame));
    println!("{}", report::render_category_summary(&frame.summary()));
    if cli.charts {
        println!("{}", report::render_hour_histogram(&frame));
    }
    println!("{}", report::render_analysis(&report_doc));

    let stats = client.stats();
    let metadata = RunMetadata {
        run_id: Uuid::new_v4(),
        handle: handle.clone(),
        started_at,
        finished_at: Utc::now(),
        post_count: snapshot.posts.len(),
        reply_count: snapshot.replies.len(),
        requests_issued: stats.requests_issued,
        rate_limit_waits: stats.rate_limit_waits,
    };
    println!("{}", report::render_run_footer(&metadata));

    if cli.save {
        let paths = report::save_results(Path::new(RESULTS_DIR), &report_doc, &metadata, &frame)?;
        println!(
            "Results saved to {} and {}",
            paths.analysis.display(),
            paths.frame.display()
        );
    }

    Ok(())
}

/// Standard analysis always runs; the enhanced per-category pass is
/// layered on top unless disabled. Both land in one report so the
/// export is a single document.
async fn analyze(
    config: &AppConfig,
    handle: &str,
    frame: &MetricsFrame,
    replies: &[Post],
    standard_only: bool,
) -> Result<postlens_core::AnalysisReport, CoreError> {
    let standard_agent = AnalysisAgent::new(OpenAiChat::new(config)?, AnalysisOptions::default());
    let mut report_doc = standard_agent.analyze(handle, frame, replies).await;

    if !standard_only {
        info!("running enhanced per-category analysis for @{handle}");
        let enhanced_agent = AnalysisAgent::new(OpenAiChat::new(config)?, AnalysisOptions::enhanced())
            .with_embeddings(EmbeddingClient::new(config)?);
        let enhanced = enhanced_agent.analyze(handle, frame, replies).await;

        report_doc.mode = AnalysisMode::Enhanced;
        report_doc.sections.extend(enhanced.sections);
        report_doc.failures.extend(enhanced.failures);
    }

    if !report_doc.is_complete() {
        warn!(
            "{} analysis section(s) unavailable for @{handle}",
            report_doc.failures.len()
        );
    }
    Ok(report_doc)
}

async fn fetch_replies_best_effort(
    client: &ProfileClient,
    handle: &str,
    max_count: usize,
) -> Vec<Post> {
    match client.fetch_replies(handle, max_count).await {
        Ok(replies) => replies,
        Err(e) => {
            error!("reply fetch for @{handle} failed, continuing without replies: {e}");
            Vec::new()
        }
    }
}

fn normalise_handle(raw: &str) -> Result<String, CoreError> {
    let handle = raw.trim().trim_start_matches('@').to_string();
    if handle.is_empty() {
        return Err(CoreError::InvalidInput {
            message: "handle must not be empty".to_string(),
        });
    }
    Ok(handle)
}
