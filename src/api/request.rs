//! Outbound request construction and the HTTP transport seam.
//!
//! [`RequestBuilder`] applies the per-platform header quirks (user-agent,
//! referer, cookie, range). [`Transport`] executes the built request; the
//! production implementation is [`HttpTransport`], tests substitute fakes.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderValue, CONTENT_RANGE, COOKIE, RANGE, REFERER, USER_AGENT};
use reqwest::{Client, Method, Request, Url};
use tracing::debug;

use super::platform::{BILIBILI, MIGU, QQ};
use crate::config::Cookies;
use crate::error::{MusicError, Result};

/// Desktop browser user-agent sent by default.
pub const UA_COMMON: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36";

/// Mobile user-agent for CDNs that reject desktop clients.
pub const UA_MOBILE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 9_1 like Mac OS X) AppleWebKit/601.1.46 (KHTML, like Gecko) Version/9.0 Mobile/13B143 Safari/601.1";

const REFERER_BILIBILI: &str = "https://www.bilibili.com/";
const REFERER_MIGU: &str = "http://music.migu.cn/";
const REFERER_QQ: &str = "http://y.qq.com";

/// Range header value for playability probes.
pub const PROBE_RANGE: &str = "bytes=0-1";

/// Builds requests carrying platform-specific headers.
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    cookies: Cookies,
}

impl RequestBuilder {
    /// Create a builder injecting cookies from `cookies`.
    pub fn new(cookies: Cookies) -> Self {
        Self { cookies }
    }

    /// Build a request for `url` on behalf of `platform`.
    ///
    /// `range` is only sent when non-empty.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRequest` if the URL does not parse or a header
    /// value is not valid ASCII.
    pub fn build(
        &self,
        method: Method,
        url: &str,
        platform: &str,
        range: Option<&str>,
    ) -> Result<Request> {
        let parsed = Url::parse(url)
            .map_err(|e| MusicError::MalformedRequest(format!("{}: {}", url, e)))?;

        let mut request = Request::new(method, parsed);
        let headers = request.headers_mut();

        if let Some(range) = range.filter(|r| !r.is_empty()) {
            headers.insert(RANGE, header_value(range)?);
        }

        headers.insert(USER_AGENT, HeaderValue::from_static(UA_COMMON));
        match platform {
            BILIBILI => {
                headers.insert(REFERER, HeaderValue::from_static(REFERER_BILIBILI));
            }
            MIGU => {
                headers.insert(USER_AGENT, HeaderValue::from_static(UA_MOBILE));
                headers.insert(REFERER, HeaderValue::from_static(REFERER_MIGU));
            }
            QQ => {
                headers.insert(REFERER, HeaderValue::from_static(REFERER_QQ));
            }
            _ => {}
        }

        if let Some(cookie) = self.cookies.get(platform) {
            headers.insert(COOKIE, header_value(&cookie)?);
        }

        Ok(request)
    }

    /// Shorthand for a GET without a range.
    pub fn get(&self, url: &str, platform: &str) -> Result<Request> {
        self.build(Method::GET, url, platform, None)
    }

    /// GET with the two-byte probe range and a timeout.
    pub fn probe(&self, url: &str, platform: &str, timeout: Duration) -> Result<Request> {
        let mut request = self.build(Method::GET, url, platform, Some(PROBE_RANGE))?;
        *request.timeout_mut() = Some(timeout);
        Ok(request)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| MusicError::MalformedRequest(format!("invalid header value: {}", e)))
}

/// A completed response: status, length hints and body.
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    pub status: u16,
    pub content_length: Option<u64>,
    pub content_range: Option<String>,
    pub body: Bytes,
}

impl Fetched {
    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 200 or 206, the statuses a playable probe may return.
    pub fn is_playable(&self) -> bool {
        self.status == 200 || self.status == 206
    }

    /// Total size from `Content-Range: bytes 0-1/<total>`, else the content length.
    pub fn total_size(&self) -> Option<u64> {
        self.content_range
            .as_deref()
            .and_then(|cr| cr.rsplit_once('/'))
            .and_then(|(_, total)| total.trim().parse().ok())
            .or(self.content_length)
    }

    /// Body bytes, or `TransportFailure` for a non-2xx status.
    pub fn into_body(self, what: &str) -> Result<Bytes> {
        if !self.is_success() {
            return Err(MusicError::TransportFailure(format!(
                "{} returned status {}",
                what, self.status
            )));
        }
        Ok(self.body)
    }
}

/// Executes built requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Fetched>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with a fresh client.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| MusicError::TransportFailure(format!("Failed to create client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request) -> Result<Fetched> {
        debug!("{} {}", request.method(), request.url());
        let response = self.client.execute(request).await?;

        let status = response.status().as_u16();
        let content_length = response.content_length();
        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.bytes().await?;

        Ok(Fetched {
            status,
            content_length,
            content_range,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn header<'a>(request: &'a Request, name: reqwest::header::HeaderName) -> Option<&'a str> {
        request.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn test_malformed_url() {
        let builder = RequestBuilder::default();
        let err = builder.get("not a url", "qq").unwrap_err();
        assert!(matches!(err, MusicError::MalformedRequest(_)));
    }

    #[test]
    fn test_default_headers() {
        let builder = RequestBuilder::default();
        let request = builder.get("https://cdn.example.org/a.mp3", "kuwo").unwrap();
        assert_eq!(header(&request, USER_AGENT), Some(UA_COMMON));
        assert!(header(&request, REFERER).is_none());
        assert!(header(&request, RANGE).is_none());
        assert!(header(&request, COOKIE).is_none());
    }

    #[test]
    fn test_migu_uses_mobile_agent_and_referer() {
        let builder = RequestBuilder::default();
        let request = builder.get("https://cdn.example.org/a.mp3", MIGU).unwrap();
        assert_eq!(header(&request, USER_AGENT), Some(UA_MOBILE));
        assert_eq!(header(&request, REFERER), Some(REFERER_MIGU));
    }

    #[test]
    fn test_range_only_when_non_empty() {
        let builder = RequestBuilder::default();
        let empty = builder
            .build(Method::GET, "https://x.org/a", BILIBILI, Some(""))
            .unwrap();
        assert!(header(&empty, RANGE).is_none());
        assert_eq!(header(&empty, REFERER), Some(REFERER_BILIBILI));

        let probe = builder
            .probe("https://x.org/a", QQ, Duration::from_secs(5))
            .unwrap();
        assert_eq!(header(&probe, RANGE), Some(PROBE_RANGE));
        assert_eq!(probe.timeout(), Some(&Duration::from_secs(5)));
    }

    #[test]
    fn test_cookie_injected_per_platform() {
        let cookies = Cookies::new();
        cookies.set_all(HashMap::from([("qq".to_string(), "uin=42".to_string())]));
        let builder = RequestBuilder::new(cookies);

        let qq = builder.get("https://x.org/a", QQ).unwrap();
        assert_eq!(header(&qq, COOKIE), Some("uin=42"));
        let other = builder.get("https://x.org/a", "kugou").unwrap();
        assert!(header(&other, COOKIE).is_none());
    }

    #[test]
    fn test_total_size_from_content_range() {
        let fetched = Fetched {
            status: 206,
            content_length: Some(2),
            content_range: Some("bytes 0-1/4000000".to_string()),
            body: Bytes::from_static(b"ab"),
        };
        assert!(fetched.is_playable());
        assert_eq!(fetched.total_size(), Some(4_000_000));

        let plain = Fetched {
            status: 200,
            content_length: Some(10),
            ..Default::default()
        };
        assert_eq!(plain.total_size(), Some(10));
    }
}
