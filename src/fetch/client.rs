use rand::Rng;
use std::sync::Arc;
use thiserror::Error;

use super::error::FetchError;
use super::interpreter::{interpret, FeedResponse, FetchOutcome};
use super::retry::RetryPolicy;
use super::source::{ArticleSource, FeedRsSource, SourceError};
use super::transport::Transport;
use crate::normalize::{FlatRecord, NormalizeError, NormalizeOptions, Normalizer};
use crate::util::{validate_url, UrlValidationError};

/// Key used to look articles up by id.
pub const ARTICLE_ID_KEY: &str = "id";

/// Failures of the article-level operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// The fetch service has queued the feed but not fetched it yet.
    #[error("Feed request is still pending")]
    StillPending,
    /// The completed article set has no article with this id.
    #[error("Article not found: {0}")]
    ArticleNotFound(String),
}

/// Per-call options of [`FeedClient::fetch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Ask the service to fetch the origin now if it has nothing cached.
    pub execute_if_not_cached: bool,
    /// Overrides the client's attempt budget.
    pub retries: Option<u32>,
}

/// Fetches feeds through the fetch service and normalizes their articles.
///
/// Holds no per-feed state; every call is independent.
#[derive(Clone)]
pub struct FeedClient {
    transport: Arc<dyn Transport>,
    source: Arc<dyn ArticleSource>,
    retry: RetryPolicy,
}

impl FeedClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            source: Arc::new(FeedRsSource),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn ArticleSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Requests one feed from the service.
    ///
    /// Returns `Ok(None)` while the service reports the request as pending.
    ///
    /// # Errors
    ///
    /// [`FetchError::Network`] once the retry budget is spent; any other
    /// [`FetchError`] variant as reported by the service, without retrying.
    pub async fn fetch(
        &self,
        url: &str,
        options: FetchOptions,
    ) -> Result<Option<FeedResponse>, FetchError> {
        let policy = match options.retries {
            Some(attempts) => self.retry.with_attempts(attempts),
            None => self.retry,
        };

        let response = policy
            .run(|attempt| {
                tracing::debug!(url = %url, attempt = attempt, "Requesting feed from service");
                self.transport.send(url, options.execute_if_not_cached)
            })
            .await?;

        match interpret(&response)? {
            FetchOutcome::Success(payload) => Ok(Some(payload)),
            FetchOutcome::Pending => {
                tracing::debug!(url = %url, "Feed request pending");
                Ok(None)
            }
        }
    }

    /// Fetches a feed and normalizes every article in it.
    ///
    /// Returns `Ok(None)` while the feed request is pending.
    pub async fn fetch_feed_articles(
        &self,
        url: &str,
        options: &NormalizeOptions,
    ) -> Result<Option<Vec<FlatRecord>>, ClientError> {
        validate_url(url)?;
        // Resolve options before spending a network round trip on them.
        let normalizer = Normalizer::new(options)?;

        let fetch_options = FetchOptions {
            execute_if_not_cached: true,
            retries: None,
        };
        let Some(payload) = self.fetch(url, fetch_options).await? else {
            return Ok(None);
        };

        let raws = self.source.articles(&payload.body)?;
        let articles = normalizer.normalize_all(&raws)?;
        tracing::info!(url = %url, count = articles.len(), "Normalized feed articles");
        Ok(Some(articles))
    }

    /// Fetches a feed and returns the article whose `id` matches.
    ///
    /// # Errors
    ///
    /// [`ClientError::StillPending`] while the request is pending,
    /// [`ClientError::ArticleNotFound`] if no article has that id.
    pub async fn fetch_feed_article(
        &self,
        url: &str,
        id: &str,
        options: &NormalizeOptions,
    ) -> Result<FlatRecord, ClientError> {
        let articles = self
            .fetch_feed_articles(url, options)
            .await?
            .ok_or(ClientError::StillPending)?;

        articles
            .into_iter()
            .find(|article| article.get(ARTICLE_ID_KEY).map(String::as_str) == Some(id))
            .ok_or_else(|| ClientError::ArticleNotFound(id.to_string()))
    }

    /// Fetches a feed and returns one article chosen uniformly at random, or
    /// `None` if the feed has no articles.
    ///
    /// # Errors
    ///
    /// [`ClientError::StillPending`] while the request is pending.
    pub async fn fetch_random_feed_article(
        &self,
        url: &str,
        options: &NormalizeOptions,
    ) -> Result<Option<FlatRecord>, ClientError> {
        let mut articles = self
            .fetch_feed_articles(url, options)
            .await?
            .ok_or(ClientError::StillPending)?;

        if articles.is_empty() {
            return Ok(None);
        }
        let index = rand::rng().random_range(0..articles.len());
        Ok(Some(articles.swap_remove(index)))
    }
}
