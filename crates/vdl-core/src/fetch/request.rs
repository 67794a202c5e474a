//! Request template: URL plus headers reused for every fetch of one resource.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::time::Duration;

use super::FetchError;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP client. Redirects are followed; no overall timeout since chunks
/// may be throttled for minutes; reads are bounded per buffer instead.
pub fn build_client() -> Result<reqwest::Client, FetchError> {
    Ok(reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()?)
}

#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl RequestTemplate {
    pub fn new(url: impl Into<String>, headers: HashMap<String, String>) -> Self {
        Self {
            url: url.into(),
            headers,
        }
    }

    /// Same headers, different URL (playlist segments, init segments).
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: self.headers.clone(),
        }
    }

    pub fn header_map(&self) -> Result<HeaderMap, FetchError> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (k, v) in &self.headers {
            let name = HeaderName::from_bytes(k.trim().as_bytes()).map_err(|e| self.invalid(e))?;
            let value = HeaderValue::from_str(v.trim()).map_err(|e| self.invalid(e))?;
            map.insert(name, value);
        }
        Ok(map)
    }

    pub fn get(&self, client: &reqwest::Client) -> Result<reqwest::RequestBuilder, FetchError> {
        let url = reqwest::Url::parse(&self.url).map_err(|e| self.invalid(e))?;
        Ok(client.get(url).headers(self.header_map()?))
    }

    fn invalid(&self, e: impl std::fmt::Display) -> FetchError {
        FetchError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        }
    }
}

/// Add Referer/Origin for CDNs that reject hotlinked requests. Existing headers win.
pub fn with_default_headers(mut headers: HashMap<String, String>, url: &str) -> HashMap<String, String> {
    let host = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default();
    let defaults: &[(&str, &str)] = if host.ends_with("mgtv.com") {
        &[("Referer", "https://www.mgtv.com"), ("Origin", "https://www.mgtv.com")]
    } else if host.contains("bilivideo") {
        &[("Referer", "https://www.bilibili.com")]
    } else {
        &[]
    };
    for (k, v) in defaults {
        let present = headers.keys().any(|existing| existing.eq_ignore_ascii_case(k));
        if !present {
            headers.insert(k.to_string(), v.to_string());
        }
    }
    headers
}
