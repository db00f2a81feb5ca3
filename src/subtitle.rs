//! SRT → WebVTT conversion and the per-language track cache.

use std::sync::Arc;

use moka::future::Cache;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::Result;
use crate::transport::{FetchRequest, TransportClient};

pub const VTT_HEADER: &str = "WEBVTT\n\n";

static SRT_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2}:\d{2}:\d{2}),(\d{3})").expect("timestamp pattern is valid"));

/// Normalize line endings, switch the millisecond delimiter to `.` and prepend the header.
pub fn to_playback_format(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let text = SRT_TIMESTAMP.replace_all(&text, "$1.$2");
    let body = text.strip_prefix("WEBVTT").map(str::trim_start).unwrap_or(&text);
    format!("{VTT_HEADER}{body}")
}

#[derive(Debug, Clone)]
struct CachedTrack {
    url: String,
    vtt: Arc<String>,
}

/// Fetches and converts subtitle tracks, holding one converted track per language code.
pub struct SubtitleTranscoder {
    transport: Arc<TransportClient>,
    tracks: Cache<String, CachedTrack>,
}

impl SubtitleTranscoder {
    pub fn new(transport: Arc<TransportClient>) -> Self {
        Self {
            transport,
            tracks: Cache::builder().max_capacity(32).build(),
        }
    }

    /// Converted track for `language`. A language already loaded from the same URL is served
    /// from memory; loading a new URL for that language replaces the entry.
    pub async fn load(&self, language: &str, url: &str) -> Result<Arc<String>> {
        if let Some(track) = self.tracks.get(language).await {
            if track.url == url {
                debug!(language, "subtitle cache hit");
                return Ok(track.vtt);
            }
        }

        let request = FetchRequest::get(url)
            .accept("text/plain, */*")
            .labelled(format!("subtitle:{language}"));
        let raw = self.transport.fetch_text(&request).await?;
        let vtt = Arc::new(to_playback_format(&raw));

        self.tracks
            .insert(
                language.to_string(),
                CachedTrack {
                    url: url.to_string(),
                    vtt: vtt.clone(),
                },
            )
            .await;
        Ok(vtt)
    }

    pub fn clear(&self) {
        self.tracks.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn srt_becomes_webvtt() {
        let vtt = to_playback_format("00:00:01,000 --> 00:00:02,000\nHi");
        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("00:00:01.000 --> 00:00:02.000"));
        assert!(vtt.ends_with("Hi"));
    }

    #[test]
    fn crlf_is_normalized() {
        let vtt = to_playback_format("1\r\n00:01:00,250 --> 00:01:02,500\r\nLine\r\n");
        assert!(!vtt.contains('\r'));
        assert!(vtt.contains("1\n00:01:00.250 --> 00:01:02.500\nLine\n"));
    }

    #[test]
    fn existing_header_is_not_duplicated() {
        let vtt = to_playback_format("WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nHi");
        assert_eq!(vtt.matches("WEBVTT").count(), 1);
    }

    #[tokio::test]
    async fn reselecting_a_language_does_not_refetch() {
        let server = MockServer::start().await;
        Mock::given(path("/en.srt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("00:00:01,000 --> 00:00:02,000\nHi"))
            .expect(1)
            .mount(&server)
            .await;

        let config = Config {
            relays: vec![],
            ..Config::default()
        };
        let transcoder = SubtitleTranscoder::new(Arc::new(TransportClient::init(&config).unwrap()));
        let url = format!("{}/en.srt", server.uri());

        let first = transcoder.load("en", &url).await.unwrap();
        let second = transcoder.load("en", &url).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
