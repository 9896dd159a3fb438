use chrono::{DateTime, Utc};
use postlens_core::{CoreError, Post, PostKind, ProfileApiError};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

const PROFILE_API_BASE: &str = "https://api.twitter.com";
const TWEET_FIELDS: &str = "created_at,public_metrics,referenced_tweets";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserData {
    pub id: String,
    pub name: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserLookupResponse {
    pub data: Option<UserData>,
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub title: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelinePage {
    #[serde(default)]
    pub data: Vec<TweetData>,
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TweetData {
    pub id: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub public_metrics: Option<PublicMetrics>,
    #[serde(default)]
    pub referenced_tweets: Vec<ReferencedTweet>,
}

/// Engagement counters as returned by the API. Missing fields default to
/// zero rather than failing the whole page.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub quote_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferencedTweet {
    #[serde(rename = "type")]
    pub ref_type: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    pub next_token: Option<String>,
    pub result_count: Option<u32>,
}

impl TweetData {
    pub fn kind(&self) -> PostKind {
        match self.referenced_tweets.first().map(|r| r.ref_type.as_str()) {
            Some("replied_to") => PostKind::Reply,
            Some("retweeted") => PostKind::Repost,
            Some("quoted") => PostKind::Quote,
            _ => PostKind::Original,
        }
    }

    pub fn into_post(self, author_handle: &str) -> Post {
        let kind = self.kind();
        let metrics = self.public_metrics.unwrap_or_default();
        Post {
            id: self.id,
            author_handle: author_handle.to_string(),
            text: self.text,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            engagement: postlens_core::EngagementCounts {
                likes: metrics.like_count,
                shares: metrics.retweet_count,
                replies: metrics.reply_count,
                quotes: metrics.quote_count,
            },
            kind,
        }
    }
}

/// Low-level client for the profile data API. One instance is built per
/// run and passed by reference; it holds no cross-call state beyond the
/// HTTP connection pool.
#[derive(Debug)]
pub struct ProfileApiClient {
    http_client: Client,
    base_url: Url,
    bearer_token: String,
}

impl ProfileApiClient {
    pub fn new(bearer_token: &str, timeout_secs: u64) -> Result<Self, CoreError> {
        Self::with_base_url(bearer_token, timeout_secs, PROFILE_API_BASE)
    }

    /// Client with a custom base URL, for pointing at a mock server in tests.
    pub fn with_base_url(
        bearer_token: &str,
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
            message: format!("invalid profile API base URL '{base_url}': {e}"),
        })?;

        Ok(Self {
            http_client,
            base_url,
            bearer_token: bearer_token.to_string(),
        })
    }

    /// Resolves a handle to the API's user record.
    pub async fn lookup_user(&self, handle: &str) -> Result<UserData, ProfileApiError> {
        let path = format!("2/users/by/username/{handle}");
        let body: UserLookupResponse = self.get_json(&path, &[], handle).await?;

        match body.data {
            Some(user) => {
                debug!("resolved @{} to user id {}", handle, user.id);
                Ok(user)
            }
            None => {
                // The API reports unknown handles as a 200 with an errors array.
                let detail = body
                    .errors
                    .first()
                    .and_then(|e| e.detail.clone())
                    .unwrap_or_default();
                info!("handle @{} did not resolve: {}", handle, detail);
                Err(ProfileApiError::ProfileNotFound {
                    handle: handle.to_string(),
                })
            }
        }
    }

    /// Fetches one page of a user's timeline, newest first.
    pub async fn user_tweets_page(
        &self,
        user_id: &str,
        handle: &str,
        per_page: u32,
        exclude_reposts: bool,
        pagination_token: Option<&str>,
    ) -> Result<TimelinePage, ProfileApiError> {
        let path = format!("2/users/{user_id}/tweets");
        let per_page_str = per_page.to_string();

        let mut params: Vec<(&str, &str)> = vec![
            ("max_results", per_page_str.as_str()),
            ("tweet.fields", TWEET_FIELDS),
        ];
        if exclude_reposts {
            params.push(("exclude", "retweets"));
        }
        if let Some(token) = pagination_token {
            params.push(("pagination_token", token));
        }

        let page: TimelinePage = self.get_json(&path, &params, handle).await?;
        debug!(
            "fetched page of {} posts for @{} (next_token: {})",
            page.data.len(),
            handle,
            page.meta
                .as_ref()
                .and_then(|m| m.next_token.as_deref())
                .unwrap_or("none")
        );
        Ok(page)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        handle: &str,
    ) -> Result<T, ProfileApiError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ProfileApiError::InvalidResponse {
                details: format!("failed to build URL for {path}: {e}"),
            })?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .query(params)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if let Some(err) = map_error_status(status, handle) {
            error!("profile API request {} failed: {}", path, err);
            return Err(err);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProfileApiError::InvalidResponse {
                details: format!("failed to parse response for {path}: {e}"),
            })
    }
}

fn classify_send_error(e: reqwest::Error) -> ProfileApiError {
    if e.is_timeout() {
        ProfileApiError::RequestTimeout
    } else {
        ProfileApiError::TransientNetwork {
            details: e.to_string(),
        }
    }
}

fn map_error_status(status: StatusCode, handle: &str) -> Option<ProfileApiError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::UNAUTHORIZED => ProfileApiError::AuthenticationFailed {
            reason: "bearer token rejected".to_string(),
        },
        StatusCode::FORBIDDEN => ProfileApiError::PermissionDenied {
            handle: handle.to_string(),
        },
        StatusCode::NOT_FOUND => ProfileApiError::ProfileNotFound {
            handle: handle.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => ProfileApiError::RateLimitExceeded { waits: 0 },
        s if s.is_server_error() => ProfileApiError::ServerError {
            status_code: s.as_u16(),
        },
        s => ProfileApiError::InvalidResponse {
            details: format!("unexpected status {s}"),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_the_error_taxonomy() {
        assert!(matches!(
            map_error_status(StatusCode::UNAUTHORIZED, "a"),
            Some(ProfileApiError::AuthenticationFailed { .. })
        ));
        assert!(matches!(
            map_error_status(StatusCode::FORBIDDEN, "a"),
            Some(ProfileApiError::PermissionDenied { .. })
        ));
        assert!(matches!(
            map_error_status(StatusCode::NOT_FOUND, "a"),
            Some(ProfileApiError::ProfileNotFound { .. })
        ));
        assert!(matches!(
            map_error_status(StatusCode::TOO_MANY_REQUESTS, "a"),
            Some(ProfileApiError::RateLimitExceeded { .. })
        ));
        assert!(matches!(
            map_error_status(StatusCode::BAD_GATEWAY, "a"),
            Some(ProfileApiError::ServerError { status_code: 502 })
        ));
        assert!(map_error_status(StatusCode::OK, "a").is_none());
    }

    #[test]
    fn kind_derivation_from_referenced_tweets() {
        let mut tweet = TweetData {
            id: "1".to_string(),
            text: "hi".to_string(),
            created_at: None,
            public_metrics: None,
            referenced_tweets: vec![],
        };
        assert_eq!(tweet.kind(), PostKind::Original);

        tweet.referenced_tweets = vec![ReferencedTweet {
            ref_type: "replied_to".to_string(),
            id: "2".to_string(),
        }];
        assert_eq!(tweet.kind(), PostKind::Reply);

        tweet.referenced_tweets[0].ref_type = "retweeted".to_string();
        assert_eq!(tweet.kind(), PostKind::Repost);

        tweet.referenced_tweets[0].ref_type = "quoted".to_string();
        assert_eq!(tweet.kind(), PostKind::Quote);
    }

    #[test]
    fn missing_metrics_default_to_zero() {
        let tweet: TweetData = serde_json::from_str(r#"{"id":"9","text":"no metrics"}"#).unwrap();
        let post = tweet.into_post("someone");
        assert_eq!(post.engagement.likes, 0);
        assert_eq!(post.engagement.total(), 0);
        assert_eq!(post.author_handle, "someone");
    }

    #[test]
    fn partial_metrics_deserialize() {
        let json = r#"{"id":"3","text":"t","public_metrics":{"like_count":4}}"#;
        let tweet: TweetData = serde_json::from_str(json).unwrap();
        let metrics = tweet.public_metrics.unwrap();
        assert_eq!(metrics.like_count, 4);
        assert_eq!(metrics.retweet_count, 0);
    }
}
