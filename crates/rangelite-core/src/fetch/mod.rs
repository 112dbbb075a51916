//! Progressive range fetch.
//!
//! After the probe reveals an image's total length, one larger range request
//! `bytes=0-target` is issued against the (possibly rewritten) URL, reusing the
//! captured method and headers with `Range` overwritten. 200 and 206 are
//! success; any other status is terminal for that image. There is no retry and
//! no fallback to the unrewritten URL.
//!
//! [`forward`] sends an intercepted request the way the rendering engine would,
//! for drivers that have no engine of their own.

mod transport;
mod error;

pub use transport::{CurlOptions, CurlTransport};
pub use error::FetchError;

use crate::intercept::{
    with_range, ByteRange, Headers, InterceptedRequest, ObservedResponse, RequestDecision,
};
use async_trait::async_trait;

/// A request the transport should perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
    pub headers: Headers,
}

impl FetchRequest {
    /// Request for `[0, target]` of `url`, keeping every other captured header.
    pub fn progressive(url: &str, method: &str, headers: &Headers, target: u64) -> Self {
        Self {
            url: url.to_string(),
            method: method.to_string(),
            headers: with_range(headers, ByteRange::prefix(target)),
        }
    }
}

/// Raw response from the transport.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// Something that can perform HTTP requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// True for the statuses a range fetch accepts: 206, or 200 when the server
/// ignored the range and sent the whole body.
pub fn is_accepted_status(status: u16) -> bool {
    status == 200 || status == 206
}

/// Performs `request` and returns the body when the status is accepted.
pub async fn fetch_range(
    transport: &dyn Transport,
    request: FetchRequest,
) -> Result<Vec<u8>, FetchError> {
    let url = request.url.clone();
    let response = transport.fetch(request).await?;
    if !is_accepted_status(response.status) {
        tracing::debug!(%url, status = response.status, "range fetch rejected");
        return Err(FetchError::Http(response.status));
    }
    Ok(response.body)
}

/// Sends an intercepted request the way the engine would after `decision`
/// and reports the response as the engine observes it.
pub async fn forward(
    transport: &dyn Transport,
    request: &InterceptedRequest,
    decision: &RequestDecision,
) -> Result<ObservedResponse, FetchError> {
    let response = transport
        .fetch(FetchRequest {
            url: request.url.clone(),
            method: request.method.clone(),
            headers: decision.effective_headers(&request.headers),
        })
        .await?;
    let mut observed = ObservedResponse::new(request.url.clone(), response.status)
        .with_body_len(response.body.len() as u64)
        .with_redirect_chain(request.redirect_chain.clone());
    observed.headers = response.headers;
    Ok(observed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted {
        status: u16,
        seen: Mutex<Vec<FetchRequest>>,
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
            self.seen.lock().unwrap().push(request);
            Ok(FetchResponse {
                status: self.status,
                headers: Headers::new(),
                body: vec![1, 2, 3],
            })
        }
    }

    fn scripted(status: u16) -> Scripted {
        Scripted {
            status,
            seen: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn progressive_request_overwrites_range() {
        let mut headers = Headers::new();
        headers.insert("Range".to_string(), "bytes=0-2047".to_string());
        headers.insert("Referer".to_string(), "https://x.test/".to_string());
        let req = FetchRequest::progressive("https://x.test/a.jpg", "GET", &headers, 20000);
        assert_eq!(req.headers.get("Range").map(String::as_str), Some("bytes=0-20000"));
        assert_eq!(
            req.headers.get("Referer").map(String::as_str),
            Some("https://x.test/")
        );
        assert_eq!(req.method, "GET");
    }

    #[test]
    fn accepted_statuses() {
        assert!(is_accepted_status(200));
        assert!(is_accepted_status(206));
        assert!(!is_accepted_status(304));
        assert!(!is_accepted_status(404));
        assert!(!is_accepted_status(416));
    }

    #[tokio::test]
    async fn fetch_range_returns_body_on_206() {
        let t = scripted(206);
        let req = FetchRequest::progressive("https://x.test/a.jpg", "GET", &Headers::new(), 9);
        let body = fetch_range(&t, req).await.unwrap();
        assert_eq!(body, vec![1, 2, 3]);
        assert_eq!(t.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn forward_applies_decision_headers() {
        use crate::intercept::ResourceType;

        let t = scripted(206);
        let request = InterceptedRequest::new("https://x.test/a.jpg", "GET", ResourceType::Image)
            .with_header("Accept", "image/*");
        let decision = RequestDecision::ContinueWithHeaders(with_range(
            &request.headers,
            ByteRange::prefix(2047),
        ));
        let observed = forward(&t, &request, &decision).await.unwrap();
        assert_eq!(observed.status, 206);
        assert_eq!(observed.body_len, Some(3));
        assert_eq!(observed.url, "https://x.test/a.jpg");

        let seen = t.seen.lock().unwrap();
        assert_eq!(
            seen[0].headers.get("Range").map(String::as_str),
            Some("bytes=0-2047")
        );
        assert_eq!(seen[0].headers.get("Accept").map(String::as_str), Some("image/*"));
    }

    #[tokio::test]
    async fn fetch_range_rejects_404() {
        let t = scripted(404);
        let req = FetchRequest::progressive("https://x.test/a.jpg", "GET", &Headers::new(), 9);
        match fetch_range(&t, req).await {
            Err(FetchError::Http(404)) => {}
            other => panic!("expected HTTP 404 error, got {:?}", other.map(|b| b.len())),
        }
    }
}
