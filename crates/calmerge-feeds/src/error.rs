//! Error types for per-source feed operations.
//!
//! A [`FeedError`] never escapes a refresh cycle: the merger turns it into
//! "this source contributed nothing" plus a diagnostic in the cycle report.

use std::fmt;
use thiserror::Error;

/// The category of a feed error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedErrorKind {
    /// Connection failed, DNS resolution failed, TLS error, reset, etc.
    Network,
    /// The request did not complete within the configured timeout.
    Timeout,
    /// The server answered with a non-success status.
    HttpStatus,
    /// The server answered successfully with an empty body.
    EmptyBody,
    /// The body is not a usable iCalendar document.
    Malformed,
    /// Unexpected local failure (client construction, task panic).
    Internal,
}

impl FeedErrorKind {
    /// Returns a stable snake_case name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::HttpStatus => "http_status",
            Self::EmptyBody => "empty_body",
            Self::Malformed => "malformed",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for FeedErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failure to obtain usable events from one feed.
#[derive(Debug, Error)]
pub struct FeedError {
    kind: FeedErrorKind,
    message: String,
    /// Id of the feed the error belongs to.
    feed: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FeedError {
    /// Creates a new feed error with the given kind and message.
    pub fn new(kind: FeedErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            feed: None,
            source: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FeedErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FeedErrorKind::Timeout, message)
    }

    pub fn http_status(message: impl Into<String>) -> Self {
        Self::new(FeedErrorKind::HttpStatus, message)
    }

    pub fn empty_body(message: impl Into<String>) -> Self {
        Self::new(FeedErrorKind::EmptyBody, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FeedErrorKind::Malformed, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FeedErrorKind::Internal, message)
    }

    /// Sets the feed id for this error.
    pub fn with_feed(mut self, feed: impl Into<String>) -> Self {
        self.feed = Some(feed.into());
        self
    }

    /// Sets the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> FeedErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the feed id, if set.
    pub fn feed(&self) -> Option<&str> {
        self.feed.as_deref()
    }
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref feed) = self.feed {
            write!(f, "[{}] ", feed)?;
        }
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A specialized Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(FeedErrorKind::HttpStatus.as_str(), "http_status");
        assert_eq!(FeedErrorKind::EmptyBody.as_str(), "empty_body");
        assert_eq!(FeedErrorKind::Malformed.to_string(), "malformed");
    }

    #[test]
    fn display_includes_feed_and_kind() {
        let err = FeedError::http_status("unexpected status 404 Not Found").with_feed("work");
        assert_eq!(err.feed(), Some("work"));
        assert_eq!(
            err.to_string(),
            "[work] http_status: unexpected status 404 Not Found"
        );
    }

    #[test]
    fn with_source_keeps_cause() {
        use std::error::Error;
        let io_err = std::io::Error::other("connection reset");
        let err = FeedError::network("request failed").with_source(io_err);
        assert!(err.source().is_some());
        assert_eq!(err.kind(), FeedErrorKind::Network);
    }
}
