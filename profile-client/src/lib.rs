pub mod api;
pub mod backoff;
pub mod stats;


use postlens_core::{AppConfig, CoreError, Post, PostKind, ProfileApiError};
use std::future::Future;
use tokio::time::sleep;
use tracing::info;

pub use api::ProfileApiClient;
pub use backoff::{BackoffStep, FetchPacing, RateLimitBackoff};
pub use stats::{FetchStats, FetchStatsCollector};

use api::UserData;

/// Upper bound on pages scanned per call, so a reply scan over a profile
/// that rarely replies cannot walk the entire timeline.
const MAX_PAGES_PER_CALL: u32 = 20;

/// High-level fetch client: resolves a handle, walks the paginated
/// timeline and applies the pacing/backoff policy. Stateless across
/// invocations apart from the per-run fetch statistics.
#[derive(Debug)]
pub struct ProfileClient {
    api: ProfileApiClient,
    pacing: FetchPacing,
    stats: FetchStatsCollector,
}

impl ProfileClient {
    pub fn new(config: &AppConfig) -> Result<Self, CoreError> {
        let api = ProfileApiClient::with_base_url(
            &config.profile_bearer_token,
            config.request_timeout_secs,
            &config.profile_api_base,
        )?;
        Ok(Self {
            api,
            pacing: FetchPacing::default(),
            stats: FetchStatsCollector::default(),
        })
    }

    pub fn with_pacing(mut self, pacing: FetchPacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Fetches up to `max_count` of the profile's posts, newest first.
    /// Reposts are excluded at the API level, matching the analysis scope.
    pub async fn fetch_posts(&self, handle: &str, max_count: usize) -> Result<Vec<Post>, CoreError> {
        self.fetch_timeline(handle, max_count, true, None).await
    }

    /// Fetches up to `max_count` of the profile's recent reply posts.
    pub async fn fetch_replies(
        &self,
        handle: &str,
        max_count: usize,
    ) -> Result<Vec<Post>, CoreError> {
        self.fetch_timeline(handle, max_count, false, Some(PostKind::Reply))
            .await
    }

    pub fn stats(&self) -> FetchStats {
        self.stats.snapshot()
    }

    async fn fetch_timeline(
        &self,
        handle: &str,
        max_count: usize,
        exclude_reposts: bool,
        filter: Option<PostKind>,
    ) -> Result<Vec<Post>, CoreError> {
        if max_count == 0 {
            return Ok(Vec::new());
        }

        let mut backoff = RateLimitBackoff::new(&self.pacing);
        let user = self
            .request_with_backoff(&mut backoff, || self.lookup_counted(handle))
            .await?;

        let mut posts: Vec<Post> = Vec::with_capacity(max_count);
        let mut token: Option<String> = None;
        let mut pages_scanned = 0u32;

        loop {
            sleep(self.pacing.page_wait()).await;

            let remaining = max_count - posts.len();
            let per_page = remaining.clamp(5, 100) as u32;
            let page = self
                .request_with_backoff(&mut backoff, || {
                    self.page_counted(&user, handle, per_page, exclude_reposts, token.as_deref())
                })
                .await?;
            self.stats.record_page();
            pages_scanned += 1;

            for tweet in page.data {
                let post = tweet.into_post(handle);
                if filter.map_or(true, |kind| post.kind == kind) {
                    posts.push(post);
                    if posts.len() >= max_count {
                        break;
                    }
                }
            }

            if posts.len() >= max_count || pages_scanned >= MAX_PAGES_PER_CALL {
                break;
            }
            match page.meta.and_then(|m| m.next_token) {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        info!(
            "fetched {} post(s) for @{} across {} page(s)",
            posts.len(),
            handle,
            pages_scanned
        );
        Ok(posts)
    }

    async fn lookup_counted(&self, handle: &str) -> Result<UserData, ProfileApiError> {
        self.stats.record_request();
        self.api.lookup_user(handle).await
    }

    async fn page_counted(
        &self,
        user: &UserData,
        handle: &str,
        per_page: u32,
        exclude_reposts: bool,
        token: Option<&str>,
    ) -> Result<api::TimelinePage, ProfileApiError> {
        self.stats.record_request();
        self.api
            .user_tweets_page(&user.id, handle, per_page, exclude_reposts, token)
            .await
    }

    /// Runs one logical request through the transient-retry helper and the
    /// bounded rate-limit state machine. A 429 that survives the transient
    /// layer triggers a long wait and a retry of the same request until
    /// the ceiling is reached.
    async fn request_with_backoff<T, F, Fut>(
        &self,
        backoff: &mut RateLimitBackoff,
        mut operation: F,
    ) -> Result<T, ProfileApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProfileApiError>>,
    {
        loop {
            match backoff::retry_transient(&self.pacing, &self.stats, &mut operation).await {
                Ok(value) => {
                    backoff.on_success();
                    return Ok(value);
                }
                Err(ProfileApiError::RateLimitExceeded { .. }) => match backoff.on_rate_limited() {
                    BackoffStep::Wait(delay) => {
                        self.stats.record_rate_limit_wait();
                        sleep(delay).await;
                    }
                    BackoffStep::GiveUp => {
                        return Err(ProfileApiError::RateLimitExceeded {
                            waits: backoff.waits_performed(),
                        })
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }
}
