use std::{net::IpAddr, time::Duration, time::Instant};

use async_trait::async_trait;
use dom_smoothie::{Article, Readability, TextMode};
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use tracing::{info, warn};

use crate::error::AppError;

const DOC_FETCH_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Stateless URL -> cleaned text collaborator. The pipeline only sees the
/// cleaned text; everything about transport lives behind this trait.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, AppError>;
}

/// Default fetcher: plain HTTP GET plus readability extraction, truncated
/// to a configured character budget.
pub struct HttpDocumentFetcher {
    client: reqwest::Client,
    char_limit: usize,
}

impl HttpDocumentFetcher {
    pub fn new(timeout_secs: u64, char_limit: usize) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(DOC_FETCH_USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client, char_limit })
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        info!("Fetching URL: {}", url);
        let now = Instant::now();

        let parsed_url = url::Url::parse(url)
            .map_err(|_| AppError::Fetch(format!("invalid URL: {url}")))?;
        ensure_fetch_url_allowed(&parsed_url)?;

        let retry_strategy = ExponentialBackoff::from_millis(100).map(jitter).take(3);
        let response = Retry::spawn(retry_strategy, || self.client.get(url).send())
            .await
            .map_err(|e| AppError::Fetch(format!("failed to fetch {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Fetch(format!(
                "fetching {url} returned HTTP {}",
                response.status()
            )));
        }

        let raw_content = response
            .text()
            .await
            .map_err(|e| AppError::Fetch(format!("failed to read body of {url}: {e}")))?;

        let config = dom_smoothie::Config {
            text_mode: TextMode::Markdown,
            ..Default::default()
        };
        let mut readability = Readability::new(raw_content, None, Some(config))
            .map_err(|e| AppError::Fetch(format!("readability setup failed for {url}: {e}")))?;
        let article: Article = readability
            .parse()
            .map_err(|e| AppError::Fetch(format!("readability parse failed for {url}: {e}")))?;

        let text = truncate_chars(&article.text_content, self.char_limit);

        info!(
            "URL: {}. Total time: {:?}. Cleaned chars: {}",
            url,
            now.elapsed(),
            text.chars().count()
        );

        Ok(text)
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

fn ensure_fetch_url_allowed(url: &url::Url) -> Result<(), AppError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            warn!(%url, %scheme, "Rejected document URL due to unsupported scheme");
            return Err(AppError::Fetch(
                "Unsupported URL scheme for document fetch".to_string(),
            ));
        }
    }

    let Some(host) = url.host_str() else {
        warn!(%url, "Rejected document URL missing host");
        return Err(AppError::Fetch(
            "URL is missing a host component".to_string(),
        ));
    };

    if host.eq_ignore_ascii_case("localhost") {
        warn!(%url, host, "Rejected document URL to localhost");
        return Err(AppError::Fetch("Document URL host is not allowed".to_string()));
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        let is_disallowed = match ip {
            IpAddr::V4(v4) => v4.is_private() || v4.is_link_local(),
            IpAddr::V6(v6) => v6.is_unique_local() || v6.is_unicast_link_local(),
        };

        if ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() || is_disallowed {
            warn!(%url, host, %ip, "Rejected document URL pointing to restricted network range");
            return Err(AppError::Fetch("Document URL host is not allowed".to_string()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_scheme() {
        let url = url::Url::parse("ftp://example.com").expect("url");
        assert!(ensure_fetch_url_allowed(&url).is_err());
    }

    #[test]
    fn rejects_localhost() {
        let url = url::Url::parse("http://localhost/docs").expect("url");
        assert!(ensure_fetch_url_allowed(&url).is_err());
    }

    #[test]
    fn rejects_private_ipv4() {
        let url = url::Url::parse("http://192.168.1.10/docs").expect("url");
        assert!(ensure_fetch_url_allowed(&url).is_err());
    }

    #[test]
    fn allows_public_domain() {
        let url = url::Url::parse("https://docs.example.com/api").expect("url");
        assert!(ensure_fetch_url_allowed(&url).is_ok());
    }

    #[test]
    fn truncates_to_char_budget() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
    }
}
