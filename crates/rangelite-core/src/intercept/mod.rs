//! Network-layer view of the page load.
//!
//! The rendering-engine driver reports every outgoing request and every
//! response as plain values; the session answers requests with a
//! [`RequestDecision`]. Nothing here talks to the network.

mod range;

pub use range::{content_range_total, fallback_target, probe_range, target_bytes, ByteRange};

use std::collections::HashMap;

/// Header map as captured from the engine. Names keep their original case.
pub type Headers = HashMap<String, String>;

/// Resource class the engine assigned to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Document,
    Image,
    Stylesheet,
    Script,
    Font,
    Media,
    Fetch,
    Other,
}

/// An outgoing request paused at the network layer.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub url: String,
    pub method: String,
    pub headers: Headers,
    pub resource_type: ResourceType,
    /// URLs of earlier hops when this request is the target of a redirect, oldest first.
    pub redirect_chain: Vec<String>,
}

impl InterceptedRequest {
    pub fn new(url: impl Into<String>, method: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            headers: Headers::new(),
            resource_type,
            redirect_chain: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_redirect_chain(mut self, chain: Vec<String>) -> Self {
        self.redirect_chain = chain;
        self
    }

    /// True for image fetches over HTTP or HTTPS; everything else is never touched.
    pub fn is_http_image(&self) -> bool {
        self.resource_type == ResourceType::Image && is_http_url(&self.url)
    }
}

/// What the engine should do with a paused request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestDecision {
    /// Forward unmodified.
    Continue,
    /// Forward with this complete header set.
    ContinueWithHeaders(Headers),
}

impl RequestDecision {
    /// Headers the request should go out with.
    pub fn effective_headers(&self, original: &Headers) -> Headers {
        match self {
            RequestDecision::Continue => original.clone(),
            RequestDecision::ContinueWithHeaders(h) => h.clone(),
        }
    }
}

/// A response observed for a request the engine sent.
#[derive(Debug, Clone)]
pub struct ObservedResponse {
    /// URL of the request this response answers.
    pub url: String,
    pub status: u16,
    pub headers: Headers,
    /// Body length in bytes, when the engine knows it.
    pub body_len: Option<u64>,
    /// Redirect hops that led to `url`, oldest first.
    pub redirect_chain: Vec<String>,
}

impl ObservedResponse {
    pub fn new(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status,
            headers: Headers::new(),
            body_len: None,
            redirect_chain: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body_len(mut self, len: u64) -> Self {
        self.body_len = Some(len);
        self
    }

    pub fn with_redirect_chain(mut self, chain: Vec<String>) -> Self {
        self.redirect_chain = chain;
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

/// Case-insensitive header lookup.
pub fn header_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Returns a copy of `headers` whose `Range` is exactly `range`, whatever case it had before.
pub fn with_range(headers: &Headers, range: ByteRange) -> Headers {
    let mut out: Headers = headers
        .iter()
        .filter(|(k, _)| !k.eq_ignore_ascii_case("range"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    out.insert("Range".to_string(), range.header_value());
    out
}

pub fn is_http_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// True when both URLs name the same document, ignoring fragment and
/// normalisation differences such as an implicit trailing `/`.
pub fn same_document(a: &str, b: &str) -> bool {
    match (url::Url::parse(a), url::Url::parse(b)) {
        (Ok(mut a), Ok(mut b)) => {
            a.set_fragment(None);
            b.set_fragment(None);
            a == b
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_image_detection() {
        let img = InterceptedRequest::new("https://x.test/a.jpg", "GET", ResourceType::Image);
        assert!(img.is_http_image());
        let data = InterceptedRequest::new("data:image/png;base64,AAAA", "GET", ResourceType::Image);
        assert!(!data.is_http_image());
        let script = InterceptedRequest::new("https://x.test/a.js", "GET", ResourceType::Script);
        assert!(!script.is_http_image());
    }

    #[test]
    fn with_range_overwrites_any_case() {
        let mut headers = Headers::new();
        headers.insert("range".to_string(), "bytes=5-9".to_string());
        headers.insert("Accept".to_string(), "image/*".to_string());
        let out = with_range(&headers, ByteRange::new(0, 2047));
        assert_eq!(out.len(), 2);
        assert_eq!(out.get("Range").map(String::as_str), Some("bytes=0-2047"));
        assert!(!out.contains_key("range"));
        assert_eq!(out.get("Accept").map(String::as_str), Some("image/*"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let resp = ObservedResponse::new("https://x.test/a.jpg", 206)
            .with_header("content-range", "bytes 0-2047/40000");
        assert_eq!(resp.header("Content-Range"), Some("bytes 0-2047/40000"));
        assert_eq!(resp.header("Content-Length"), None);
    }

    #[test]
    fn same_document_ignores_trailing_slash_and_fragment() {
        assert!(same_document("https://a.test", "https://a.test/"));
        assert!(same_document("https://a.test/p#top", "https://a.test/p"));
        assert!(!same_document("https://a.test/p", "https://a.test/q"));
        assert!(same_document("not a url", "not a url"));
    }

    #[test]
    fn decision_effective_headers() {
        let mut original = Headers::new();
        original.insert("Accept".to_string(), "*/*".to_string());
        assert_eq!(RequestDecision::Continue.effective_headers(&original), original);
        let modified = with_range(&original, ByteRange::new(0, 10));
        let decision = RequestDecision::ContinueWithHeaders(modified.clone());
        assert_eq!(decision.effective_headers(&original), modified);
    }
}
