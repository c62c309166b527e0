use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum FeedError {
    /// No bearer token configured; nothing is sent.
    MissingCredential,
    /// Token present but unusable as an `Authorization` header value. Never retried.
    InvalidCredential,
    /// HTTP 410: the feed endpoint itself is no longer valid. Never retried.
    Gone { url: String },
    /// Any other non-success status. Retryable.
    Status {
        status: StatusCode,
        url: String,
        body: String,
    },
    /// Network, body read or decode failure. Retryable.
    Transport(anyhow::Error),
    DeadlineExceeded { elapsed: Duration },
    PageLimitExceeded { max_pages: usize },
}

impl FeedError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedError::Status { .. } | FeedError::Transport(_))
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, FeedError::Gone { .. })
    }
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::MissingCredential => {
                write!(f, "feed auth token is not configured (FEED_AUTH_TOKEN)")
            }
            FeedError::InvalidCredential => write!(
                f,
                "feed auth token is not a valid HTTP header value (FEED_AUTH_TOKEN)"
            ),
            FeedError::Gone { url } => write!(
                f,
                "feed resource is no longer available (410 Gone) at {url}"
            ),
            FeedError::Status { status, url, body } => {
                write!(f, "feed HTTP {status} for {url}: {body}")
            }
            FeedError::Transport(err) => write!(f, "feed transport error: {err:#}"),
            FeedError::DeadlineExceeded { elapsed } => {
                write!(f, "feed sync deadline exceeded after {elapsed:?}")
            }
            FeedError::PageLimitExceeded { max_pages } => {
                write!(f, "feed returned more than {max_pages} pages")
            }
        }
    }
}

impl std::error::Error for FeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FeedError::Transport(err) => Some(&**err),
            _ => None,
        }
    }
}
