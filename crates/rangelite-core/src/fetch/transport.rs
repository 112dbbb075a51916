//! libcurl transport: one easy handle per request, run on tokio's blocking pool.

use super::{FetchError, FetchRequest, FetchResponse, Transport};
use crate::intercept::Headers;
use async_trait::async_trait;
use std::str;
use std::time::Duration;

/// Transfer options. No overall timeout: a stalled fetch only costs its own image.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurlOptions {
    pub connect_timeout: Option<Duration>,
    pub max_redirections: Option<u32>,
}

/// [`Transport`] backed by the curl crate.
#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    options: CurlOptions,
}

impl CurlTransport {
    pub fn new(options: CurlOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Transport for CurlTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let options = self.options;
        tokio::task::spawn_blocking(move || perform(&request, options)).await?
    }
}

/// Runs one request to completion in the current thread.
fn perform(request: &FetchRequest, options: CurlOptions) -> Result<FetchResponse, FetchError> {
    let mut header_lines: Vec<String> = Vec::new();
    let mut body: Vec<u8> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(&request.url)?;
    easy.follow_location(true)?;
    if let Some(max) = options.max_redirections {
        easy.max_redirections(max)?;
    }
    if let Some(timeout) = options.connect_timeout {
        easy.connect_timeout(timeout)?;
    }
    if request.method.eq_ignore_ascii_case("HEAD") {
        easy.nobody(true)?;
    } else if !request.method.eq_ignore_ascii_case("GET") {
        easy.custom_request(&request.method)?;
    }

    // Build curl list for request headers (e.g. "Range: bytes=0-2047").
    let mut list = curl::easy::List::new();
    for (k, v) in &request.headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    if !request.headers.is_empty() {
        easy.http_headers(list)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                header_lines.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let status = easy.response_code()? as u16;
    tracing::trace!(url = %request.url, status, bytes = body.len(), "curl transfer finished");
    Ok(FetchResponse {
        status,
        headers: parse_header_lines(&header_lines),
        body,
    })
}

/// Parse collected header lines into a map. A status line starts a new
/// header block, so after redirects only the final response's headers remain.
fn parse_header_lines(lines: &[String]) -> Headers {
    let mut headers = Headers::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            headers.clear();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_string(), value.trim().to_string());
        }
    }
    headers
}
