//! # Source Fetching
//!
//! The first two verification layers: is the cited URL reachable, and what
//! text does it serve. Both are best effort and never raise; a failure is
//! recorded in the returned value.

use crate::claims::UrlCheck;
use async_trait::async_trait;
use std::time::Duration;

const CHECK_TIMEOUT: Duration = Duration::from_secs(10);
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = "Mozilla/5.0 (compatible; Ghostwriter/1.0; +research-verification)";

/// Longest page text kept per claim
pub const MAX_CONTENT_CHARS: usize = 10_000;

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// HEAD probe; 2xx and 3xx count as reachable
    async fn check_url(&self, url: &str) -> UrlCheck;

    /// Page text (HTML stripped, truncated), or `None` when nothing usable came back
    async fn fetch_content(&self, url: &str) -> Option<String>;
}

pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> crate::error::Result<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn check_url(&self, url: &str) -> UrlCheck {
        match self.http.head(url).timeout(CHECK_TIMEOUT).send().await {
            Ok(response) => {
                let status = response.status();
                UrlCheck {
                    url: url.to_string(),
                    reachable: status.is_success() || status.is_redirection(),
                    status_code: Some(status.as_u16()),
                    error: None,
                }
            }
            Err(e) => UrlCheck {
                url: url.to_string(),
                reachable: false,
                status_code: e.status().map(|s| s.as_u16()),
                error: Some(e.to_string()),
            },
        }
    }

    async fn fetch_content(&self, url: &str) -> Option<String> {
        let response = match self.http.get(url).timeout(FETCH_TIMEOUT).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url, error = %e, "content fetch failed");
                return None;
            }
        };

        if !has_content(response.status()) {
            tracing::debug!(url, status = %response.status(), "content fetch returned no content");
            return None;
        }

        let body = response.text().await.ok()?;
        let text = truncate_chars(&html_to_text(&body), MAX_CONTENT_CHARS);
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Any 2xx body is worth reading
fn has_content(status: reqwest::StatusCode) -> bool {
    status.is_success() && status != reqwest::StatusCode::NO_CONTENT
}

/// Strip markup and collapse whitespace
pub fn html_to_text(html: &str) -> String {
    let mut text = html.to_string();

    for pattern in [
        r"(?is)<script\b[^>]*>.*?</script>",
        r"(?is)<style\b[^>]*>.*?</style>",
        r"(?is)<!--.*?-->",
        r"(?s)<[^>]+>",
    ] {
        if let Ok(re) = regex::Regex::new(pattern) {
            text = re.replace_all(&text, " ").into_owned();
        }
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_strips_markup() {
        let html = r#"<html><head><style>body { color: red; }</style>
            <script>var x = "<b>";</script></head>
            <body><h1>Blend&nbsp;Capital</h1><!-- nav --><p>APY &amp; TVL</p></body></html>"#;
        assert_eq!(html_to_text(html), "Blend Capital APY & TVL");
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(html_to_text("  plain\n\ntext  "), "plain text");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars(&"a".repeat(20_000), MAX_CONTENT_CHARS).len(), 10_000);
    }

    #[test]
    fn test_every_2xx_with_a_body_is_read() {
        use reqwest::StatusCode;
        assert!(has_content(StatusCode::OK));
        assert!(has_content(StatusCode::NON_AUTHORITATIVE_INFORMATION));
        assert!(has_content(StatusCode::PARTIAL_CONTENT));
        assert!(!has_content(StatusCode::NO_CONTENT));
        assert!(!has_content(StatusCode::MOVED_PERMANENTLY));
        assert!(!has_content(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_unreachable_url_is_recorded() {
        let fetcher = HttpFetcher::new().unwrap();
        let check = fetcher.check_url("http://127.0.0.1:9/nothing").await;
        assert!(!check.reachable);
        assert!(check.error.is_some());
        assert!(fetcher.fetch_content("http://127.0.0.1:9/nothing").await.is_none());
    }
}
