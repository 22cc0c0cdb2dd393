//! TMDB (The Movie Database) catalog gateway.
//!
//! Implements [`MetadataGateway`] and [`ArtworkSource`] over the TMDB v3 REST
//! API. Only the first search result is used; there is no retry or rate
//! limiting. Requests time out after the configured number of seconds.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::config::MetadataConfig;
use crate::library::ArtworkRef;
use crate::metadata::provider::{
    ArtworkSource, EpisodeRecord, MetadataGateway, MetadataRecord, SeasonRecord,
};

// ---------------------------------------------------------------------------
// TMDB API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieSearchResult {
    id: u64,
    title: Option<String>,
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvSearchResult {
    id: u64,
    name: Option<String>,
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbSeasonDetail {
    season_number: Option<u32>,
    poster_path: Option<String>,
    #[serde(default)]
    episodes: Vec<TmdbEpisode>,
}

#[derive(Debug, Deserialize)]
struct TmdbEpisode {
    episode_number: Option<u32>,
    name: Option<String>,
    still_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Gateway implementation
// ---------------------------------------------------------------------------

/// TMDB-backed catalog gateway.
///
/// # Examples
///
/// ```no_run
/// use codex::config::MetadataConfig;
/// use codex::metadata::TmdbGateway;
///
/// let mut config = MetadataConfig::default();
/// config.api_key = Some("your-api-key".into());
/// let gateway = TmdbGateway::new(&config).unwrap();
/// ```
pub struct TmdbGateway {
    client: reqwest::Client,
    api_key: String,
    language: String,
    api_base_url: String,
    image_base_url: String,
}

impl TmdbGateway {
    /// Build a gateway from the `[metadata]` config section.
    ///
    /// A missing API key is not an error here; TMDB will answer with 401 and
    /// every lookup degrades to "no artwork".
    pub fn new(config: &MetadataConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: config.api_key.clone().unwrap_or_default(),
            language: config.language.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            image_base_url: config.image_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build a full API URL with the API key and language query parameters.
    fn url(&self, path: &str, extra_params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}{path}?api_key={}&language={}",
            self.api_base_url,
            urlencoded(&self.api_key),
            urlencoded(&self.language)
        );
        for (key, value) in extra_params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoded(value));
        }
        url
    }

    /// GET `url`, failing on transport errors and non-2xx statuses.
    async fn get(&self, url: &str) -> anyhow::Result<reqwest::Response> {
        self.client
            .get(url)
            .send()
            .await
            .with_context(|| format!("TMDB request failed: {}", redact(url)))?
            .error_for_status()
            .with_context(|| format!("TMDB request returned error: {}", redact(url)))
    }

    fn image_url(&self, reference: &ArtworkRef) -> String {
        let path = reference.as_str();
        if path.starts_with('/') {
            format!("{}{path}", self.image_base_url)
        } else {
            format!("{}/{path}", self.image_base_url)
        }
    }
}

/// Minimal percent-encoding for query parameter values.
fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0x0f) as usize]));
            }
        }
    }
    out
}

const HEX: [u8; 16] = *b"0123456789ABCDEF";

/// Strip the API key from a URL before it goes into a log line or error.
fn redact(url: &str) -> String {
    match url.find("api_key=") {
        Some(start) => {
            let value_start = start + "api_key=".len();
            let value_end = url[value_start..]
                .find('&')
                .map(|i| value_start + i)
                .unwrap_or(url.len());
            format!("{}***{}", &url[..value_start], &url[value_end..])
        }
        None => url.to_string(),
    }
}

#[async_trait]
impl MetadataGateway for TmdbGateway {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    async fn find_movie(
        &self,
        title: &str,
        year: Option<u16>,
    ) -> anyhow::Result<Option<MetadataRecord>> {
        let mut params = vec![("query", title)];
        let year_str = year.map(|y| y.to_string());
        if let Some(ref y) = year_str {
            params.push(("year", y.as_str()));
        }

        let url = self.url("/search/movie", &params);
        debug!(url = %redact(&url), "TMDB search movie");

        let body: TmdbSearchResponse<TmdbMovieSearchResult> = self
            .get(&url)
            .await?
            .json()
            .await
            .context("failed to parse TMDB movie search response")?;

        Ok(body.results.into_iter().next().map(|r| MetadataRecord {
            id: r.id,
            title: r.title.unwrap_or_else(|| title.to_string()),
            artwork: ArtworkRef::from_optional(r.poster_path),
        }))
    }

    async fn find_show(&self, title: &str) -> anyhow::Result<Option<MetadataRecord>> {
        let url = self.url("/search/tv", &[("query", title)]);
        debug!(url = %redact(&url), "TMDB search TV");

        let body: TmdbSearchResponse<TmdbTvSearchResult> = self
            .get(&url)
            .await?
            .json()
            .await
            .context("failed to parse TMDB TV search response")?;

        Ok(body.results.into_iter().next().map(|r| MetadataRecord {
            id: r.id,
            title: r.name.unwrap_or_else(|| title.to_string()),
            artwork: ArtworkRef::from_optional(r.poster_path),
        }))
    }

    async fn season_details(
        &self,
        show_id: u64,
        season_number: u32,
    ) -> anyhow::Result<Option<SeasonRecord>> {
        let url = self.url(&format!("/tv/{show_id}/season/{season_number}"), &[]);
        debug!(url = %redact(&url), "TMDB get season details");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("TMDB request failed: {}", redact(&url)))?;

        // TMDB answers 404 for seasons it does not know.
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let detail: TmdbSeasonDetail = resp
            .error_for_status()
            .with_context(|| format!("TMDB request returned error: {}", redact(&url)))?
            .json()
            .await
            .context("failed to parse TMDB season response")?;

        Ok(Some(SeasonRecord {
            season_number: detail.season_number.unwrap_or(season_number),
            artwork: ArtworkRef::from_optional(detail.poster_path),
            episodes: detail
                .episodes
                .into_iter()
                .map(|e| EpisodeRecord {
                    episode_number: e.episode_number,
                    name: e.name,
                    still: ArtworkRef::from_optional(e.still_path),
                })
                .collect(),
        }))
    }
}

#[async_trait]
impl ArtworkSource for TmdbGateway {
    async fn fetch_image(&self, reference: &ArtworkRef) -> anyhow::Result<Bytes> {
        let url = self.image_url(reference);
        debug!(url = %url, "TMDB fetch image");

        let bytes = self
            .get(&url)
            .await?
            .bytes()
            .await
            .with_context(|| format!("failed to read image body: {url}"))?;

        anyhow::ensure!(!bytes.is_empty(), "empty image body: {url}");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> TmdbGateway {
        let config = MetadataConfig {
            api_key: Some("secret".into()),
            ..MetadataConfig::default()
        };
        TmdbGateway::new(&config).unwrap()
    }

    #[test]
    fn url_encoding() {
        assert_eq!(urlencoded("hello world"), "hello+world");
        assert_eq!(urlencoded("foo&bar"), "foo%26bar");
        assert_eq!(urlencoded("simple"), "simple");
    }

    #[test]
    fn url_construction() {
        let url = gateway().url("/search/movie", &[("query", "Foo Bar"), ("year", "2001")]);
        assert_eq!(
            url,
            "https://api.themoviedb.org/3/search/movie?api_key=secret&language=en-US&query=Foo+Bar&year=2001"
        );
    }

    #[test]
    fn redact_hides_api_key() {
        assert_eq!(
            redact("http://x/search?api_key=secret&language=en-US"),
            "http://x/search?api_key=***&language=en-US"
        );
        assert_eq!(redact("http://x/a?api_key=secret"), "http://x/a?api_key=***");
        assert_eq!(redact("http://x/a.jpg"), "http://x/a.jpg");
    }

    #[test]
    fn image_url_construction() {
        let g = gateway();
        let reference = ArtworkRef::parse("/abc123.jpg").unwrap();
        assert_eq!(
            g.image_url(&reference),
            "https://image.tmdb.org/t/p/w200/abc123.jpg"
        );
        let bare = ArtworkRef::parse("abc123.jpg").unwrap();
        assert_eq!(g.image_url(&bare), "https://image.tmdb.org/t/p/w200/abc123.jpg");
    }

    #[test]
    fn gateway_name() {
        assert_eq!(gateway().name(), "tmdb");
    }
}
