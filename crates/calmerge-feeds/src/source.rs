//! Configured feed sources.

use thiserror::Error;
use url::Url;

/// Why a feed entry could not be turned into a [`FeedSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid feed URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported URL scheme '{scheme}' in '{url}' (expected http, https or webcal)")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("feed id must not be empty (url '{url}')")]
    EmptyId { url: String },
}

/// One upstream calendar.
///
/// The id names the source in merged event identifiers, provenance tags and
/// logs. It defaults to the URL as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    id: String,
    url: Url,
}

impl FeedSource {
    /// Creates a source identified by its URL.
    ///
    /// `webcal://` and `webcals://` URLs are fetched over `https://`.
    pub fn new(url: &str) -> Result<Self, SourceError> {
        let normalized = normalize_scheme(url.trim());
        let parsed = parse_url(&normalized)?;
        Ok(Self {
            id: normalized,
            url: parsed,
        })
    }

    /// Creates a source with an explicit id.
    pub fn with_id(id: impl Into<String>, url: &str) -> Result<Self, SourceError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(SourceError::EmptyId {
                url: url.to_string(),
            });
        }
        let mut source = Self::new(url)?;
        source.id = id;
        Ok(source)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

fn normalize_scheme(url: &str) -> String {
    for prefix in ["webcals://", "webcal://"] {
        let matches = url
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if matches {
            return format!("https://{}", &url[prefix.len()..]);
        }
    }
    url.to_string()
}

fn parse_url(url: &str) -> Result<Url, SourceError> {
    let parsed = Url::parse(url).map_err(|source| SourceError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(SourceError::UnsupportedScheme {
            url: url.to_string(),
            scheme: scheme.to_string(),
        }),
    }
}
