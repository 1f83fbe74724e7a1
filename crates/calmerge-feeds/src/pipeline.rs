//! One source's fetch followed by parsing.

use calmerge_core::{ParsedFeed, parse_feed};
use tracing::debug;

use crate::error::FeedError;
use crate::fetcher::FeedFetcher;
use crate::source::FeedSource;

/// What one source contributed to a refresh cycle.
pub type SourceOutcome = Result<ParsedFeed, FeedError>;

/// Fetches `source` and parses the body.
///
/// A document that cannot be parsed at all is reported like a fetch failure
/// (kind [`Malformed`](crate::FeedErrorKind::Malformed)). Malformed
/// individual events only show up in [`ParsedFeed::skipped_blocks`].
pub async fn fetch_and_parse(fetcher: &dyn FeedFetcher, source: &FeedSource) -> SourceOutcome {
    let body = fetcher.fetch(source).await?;

    let feed = parse_feed(&body, source.url().as_str()).map_err(|e| {
        FeedError::malformed(e.to_string())
            .with_feed(source.id())
            .with_source(e)
    })?;

    debug!(
        feed = %source.id(),
        events = feed.events.len(),
        skipped = feed.skipped_blocks,
        "Feed ready"
    );
    Ok(feed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedErrorKind;
    use crate::fetcher::{BoxFuture, RawFeedResult};

    struct Fixed(&'static str);

    impl FeedFetcher for Fixed {
        fn fetch<'a>(&'a self, _source: &'a FeedSource) -> BoxFuture<'a, RawFeedResult> {
            let body = self.0.to_string();
            Box::pin(async move { Ok(body) })
        }
    }

    struct Failing;

    impl FeedFetcher for Failing {
        fn fetch<'a>(&'a self, source: &'a FeedSource) -> BoxFuture<'a, RawFeedResult> {
            Box::pin(async move { Err(FeedError::timeout("too slow").with_feed(source.id())) })
        }
    }

    fn source() -> FeedSource {
        FeedSource::with_id("team", "https://example.com/team.ics").unwrap()
    }

    #[tokio::test]
    async fn parses_fetched_body() {
        let fetcher = Fixed(
            "BEGIN:VCALENDAR\r\n\
             BEGIN:VEVENT\r\nUID:abc\r\nDTSTART:20240101T100000Z\r\nSUMMARY:Standup\r\nEND:VEVENT\r\n\
             END:VCALENDAR\r\n",
        );

        let feed = fetch_and_parse(&fetcher, &source()).await.unwrap();

        assert_eq!(feed.events.len(), 1);
        assert_eq!(feed.events[0].title, "Standup");
        assert_eq!(feed.events[0].source, "https://example.com/team.ics");
    }

    #[tokio::test]
    async fn unparsable_document_is_malformed() {
        let fetcher = Fixed("<html><body>Sign in</body></html>");

        let err = fetch_and_parse(&fetcher, &source()).await.unwrap_err();

        assert_eq!(err.kind(), FeedErrorKind::Malformed);
        assert_eq!(err.feed(), Some("team"));
    }

    #[tokio::test]
    async fn fetch_errors_pass_through() {
        let err = fetch_and_parse(&Failing, &source()).await.unwrap_err();
        assert_eq!(err.kind(), FeedErrorKind::Timeout);
    }
}
