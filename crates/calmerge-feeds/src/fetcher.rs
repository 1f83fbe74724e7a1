//! Fetching raw ICS text.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, trace};

use crate::error::{FeedError, FeedResult};
use crate::source::FeedSource;

/// A boxed future for trait methods that must stay object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Raw body of one feed, or why it could not be obtained.
pub type RawFeedResult = FeedResult<String>;

/// Fetcher settings.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Bound on one whole request, body included.
    pub timeout: Duration,
    /// `User-Agent` header sent upstream.
    pub user_agent: String,
}

impl FetcherConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("calmerge/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Retrieves the raw text of a feed.
///
/// Implementations make exactly one attempt per call. Retrying is left to
/// the next refresh cycle.
pub trait FeedFetcher: Send + Sync {
    /// Fetches the body of `source`.
    ///
    /// # Errors
    ///
    /// Returns a [`FeedError`] tagged with the source id and classified as
    /// network, timeout, HTTP status or empty body.
    fn fetch<'a>(&'a self, source: &'a FeedSource) -> BoxFuture<'a, RawFeedResult>;
}

/// [`FeedFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds the HTTP client. Redirects and TLS follow the client defaults.
    pub fn new(config: &FetcherConfig) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                FeedError::internal(format!("failed to create HTTP client: {}", e)).with_source(e)
            })?;
        Ok(Self { client })
    }

    async fn get(&self, source: &FeedSource) -> RawFeedResult {
        trace!(feed = %source.id(), url = %source.url(), "Fetching feed");

        let response = self
            .client
            .get(source.url().clone())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::http_status(format!("unexpected status {}", status)));
        }

        let body = response.text().await.map_err(classify)?;
        if body.trim().is_empty() {
            return Err(FeedError::empty_body(format!(
                "server answered {} with an empty body",
                status
            )));
        }

        debug!(feed = %source.id(), bytes = body.len(), "Fetched feed");
        Ok(body)
    }
}

impl FeedFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, source: &'a FeedSource) -> BoxFuture<'a, RawFeedResult> {
        Box::pin(async move { self.get(source).await.map_err(|e| e.with_feed(source.id())) })
    }
}

fn classify(err: reqwest::Error) -> FeedError {
    let error = if err.is_timeout() {
        FeedError::timeout(format!("request timed out: {}", err))
    } else {
        FeedError::network(format!("request failed: {}", err))
    };
    error.with_source(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedErrorKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BODY: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VCALENDAR\r\n";

    fn fetcher(timeout: Duration) -> HttpFetcher {
        HttpFetcher::new(
            &FetcherConfig::default()
                .with_timeout(timeout)
                .with_user_agent("calmerge-test"),
        )
        .unwrap()
    }

    fn source(server: &MockServer, route: &str) -> FeedSource {
        FeedSource::with_id("test", &format!("{}{}", server.uri(), route)).unwrap()
    }

    #[tokio::test]
    async fn fetch_returns_body_and_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/team.ics"))
            .and(header("user-agent", "calmerge-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
            .expect(1)
            .mount(&server)
            .await;

        let body = fetcher(Duration::from_secs(5))
            .fetch(&source(&server, "/team.ics"))
            .await
            .unwrap();

        assert_eq!(body, BODY);
    }

    #[tokio::test]
    async fn non_success_status_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher(Duration::from_secs(5))
            .fetch(&source(&server, "/missing.ics"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FeedErrorKind::HttpStatus);
        assert_eq!(err.feed(), Some("test"));
        assert!(err.message().contains("404"));
    }

    #[tokio::test]
    async fn blank_body_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(" \r\n"))
            .mount(&server)
            .await;

        let err = fetcher(Duration::from_secs(5))
            .fetch(&source(&server, "/empty.ics"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FeedErrorKind::EmptyBody);
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(BODY)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = fetcher(Duration::from_millis(100))
            .fetch(&source(&server, "/slow.ics"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FeedErrorKind::Timeout);
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        // Bind then drop a listener to get a port nobody listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let source = FeedSource::new(&format!("http://127.0.0.1:{port}/cal.ics")).unwrap();

        let err = fetcher(Duration::from_secs(5))
            .fetch(&source)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FeedErrorKind::Network);
    }
}
