use crate::config::Settings;
use crate::feed::{FeedClient, FeedError, FeedPage};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: String,
}

impl HttpFeedClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout_secs = std::env::var("FEED_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(
            settings.feed_base_url.clone(),
            settings.feed_auth_token.clone(),
            Duration::from_secs(timeout_secs),
        )
    }

    pub fn new(
        base_url: impl Into<String>,
        auth_token: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build feed http client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            auth_token: auth_token.into(),
        })
    }

    /// `Authorization` value for every request; a bad token is a configuration error, not a
    /// transport one.
    fn bearer(&self) -> Result<HeaderValue, FeedError> {
        let token = self.auth_token.trim();
        if token.is_empty() {
            return Err(FeedError::MissingCredential);
        }
        HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| FeedError::InvalidCredential)
    }

    fn headers(&self) -> Result<HeaderMap, FeedError> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.bearer()?);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl FeedClient for HttpFeedClient {
    fn feed_name(&self) -> &'static str {
        "http_json_feed"
    }

    fn ensure_configured(&self) -> Result<(), FeedError> {
        self.bearer().map(|_| ())
    }

    async fn fetch_page(&self, cursor: &str) -> Result<FeedPage, FeedError> {
        self.ensure_configured()?;

        let mut req = self.http.get(&self.base_url).headers(self.headers()?);
        if !cursor.is_empty() {
            req = req.query(&[("next_page", cursor)]);
        }

        let res = req
            .send()
            .await
            .context("feed request failed")
            .map_err(FeedError::Transport)?;

        let status = res.status();
        let url = res.url().to_string();
        let text = res
            .text()
            .await
            .context("failed to read feed response")
            .map_err(FeedError::Transport)?;

        if status == StatusCode::GONE {
            return Err(FeedError::Gone { url });
        }
        if !status.is_success() {
            return Err(FeedError::Status {
                status,
                url,
                body: text,
            });
        }

        let page = serde_json::from_str::<FeedPage>(&text)
            .context("failed to parse feed page")
            .map_err(FeedError::Transport)?;
        Ok(sanitize_page(page))
    }
}

fn sanitize_page(mut page: FeedPage) -> FeedPage {
    let before = page.items.len();
    page.items.retain_mut(|item| {
        item.ticker = item.ticker.trim().to_string();
        item.validate().is_ok()
    });

    let dropped = before - page.items.len();
    if dropped > 0 {
        tracing::warn!(dropped, next_page = %page.next_page, "feed items without ticker; skipping");
    }
    page
}
