//! Session lifecycle: request probing, per-image pipelines and the cutoff.
//!
//! The rendering-engine driver feeds every outgoing request to
//! [`Session::on_request`] and every response to [`Session::on_response`].
//! Qualifying image requests are truncated to a small probe range; the probe
//! response reveals the total length, after which a DOM match and a
//! progressive range fetch run concurrently for that image. Whichever of the
//! two finishes second triggers compositing, so each image is applied at most
//! once. Image-level failures stay local; only a failed top-level navigation
//! fails the session.

mod record;


pub use record::{ImageRecord, ImageState, RecordSummary};

use crate::compositor::{apply_payload, build_payload};
use crate::config::LiteConfig;
use crate::fetch::{fetch_range, FetchRequest, Transport};
use crate::intercept::{
    content_range_total, fallback_target, probe_range, same_document, target_bytes, with_range,
    InterceptedRequest, ObservedResponse, RequestDecision,
};
use crate::logging::{image_span, session_span};
use crate::matcher::{find_bindings, Binding};
use crate::page::PageDriver;
use crate::rewrite::RuleSet;
use record::AfterFetch;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span};

/// Errors that fail the whole run.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("navigation to {url} returned HTTP {status}")]
    NavigationFailed { url: String, status: u16 },
    #[error("audit failed")]
    Audit(#[source] anyhow::Error),
    #[error("writing report {}: {source}", .path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serializing report: {0}")]
    ReportJson(#[from] serde_json::Error),
}

/// Outcome of a successful session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub navigation_url: String,
    /// Last status seen for the navigation URL, if any.
    pub navigation_status: Option<u16>,
    /// Every tracked image, by id.
    pub records: Vec<RecordSummary>,
}

impl SessionReport {
    pub fn applied(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.state == ImageState::Applied)
            .count()
    }
}

#[derive(Default)]
struct SessionState {
    records: HashMap<String, ImageRecord>,
    next_id: u64,
    navigation_status: Option<u16>,
    navigation_error: Option<u16>,
}

struct Inner {
    navigation_url: String,
    config: LiteConfig,
    transport: Arc<dyn Transport>,
    driver: Arc<dyn PageDriver>,
    cutoff: AtomicBool,
    state: Mutex<SessionState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    span: Span,
}

impl Inner {
    fn with_record<T>(&self, key: &str, f: impl FnOnce(&mut ImageRecord) -> T) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        state.records.get_mut(key).map(f)
    }
}

/// One page load. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// New session for `navigation_url`. With `config.intercept` off the
    /// cutoff starts set and every request passes through.
    pub fn new(
        navigation_url: impl Into<String>,
        config: LiteConfig,
        transport: Arc<dyn Transport>,
        driver: Arc<dyn PageDriver>,
    ) -> Self {
        let cutoff = !config.intercept;
        let navigation_url = navigation_url.into();
        let span = session_span(&navigation_url);
        Self {
            inner: Arc::new(Inner {
                navigation_url,
                config,
                transport,
                driver,
                cutoff: AtomicBool::new(cutoff),
                state: Mutex::new(SessionState::default()),
                tasks: Mutex::new(Vec::new()),
                span,
            }),
        }
    }

    pub fn navigation_url(&self) -> &str {
        &self.inner.navigation_url
    }

    pub fn config(&self) -> &LiteConfig {
        &self.inner.config
    }

    pub fn is_intercepting(&self) -> bool {
        !self.inner.cutoff.load(Ordering::SeqCst)
    }

    /// Stops admitting new images. In-flight images still complete. Idempotent.
    pub fn disable_interception(&self) {
        if !self.inner.cutoff.swap(true, Ordering::SeqCst) {
            let _span = self.inner.span.enter();
            tracing::info!("image interception disabled");
        }
    }

    /// Decides how an outgoing request proceeds.
    pub fn on_request(&self, request: &InterceptedRequest) -> RequestDecision {
        if !self.is_intercepting() || !request.is_http_image() {
            return RequestDecision::Continue;
        }

        let _span = self.inner.span.enter();
        let probe = probe_range(self.inner.config.probe_bytes);
        let mut state = self.inner.state.lock().unwrap();

        if let Some(existing) = state.records.get(&request.url) {
            tracing::trace!(id = existing.id, url = %request.url, "duplicate image request");
            return RequestDecision::Continue;
        }

        if let Some(origin) = request.redirect_chain.first() {
            if let Some(record) = state.records.get_mut(origin) {
                record.push_redirect(&request.url);
                tracing::debug!(id = record.id, url = %request.url, "image redirect hop");
                return RequestDecision::ContinueWithHeaders(with_range(&request.headers, probe));
            }
        }

        let id = state.next_id;
        state.next_id += 1;
        let headers = with_range(&request.headers, probe);
        let replaced_url = self.replaced_url(&request.url);
        tracing::debug!(
            id,
            url = %request.url,
            replaced = %replaced_url,
            range = %probe.header_value(),
            "probing image"
        );
        state.records.insert(
            request.url.clone(),
            ImageRecord::new(
                id,
                request.url.clone(),
                replaced_url,
                request.method.clone(),
                headers.clone(),
            ),
        );
        RequestDecision::ContinueWithHeaders(headers)
    }

    /// Handles a response: checks the navigation status and starts the
    /// pipeline for the first response of each tracked image. Must be called
    /// from within a tokio runtime.
    pub fn on_response(&self, response: &ObservedResponse) {
        let _span = self.inner.span.enter();
        if same_document(&response.url, &self.inner.navigation_url) {
            self.observe_navigation(response.status);
        }

        let key = response
            .redirect_chain
            .first()
            .unwrap_or(&response.url)
            .clone();
        let fraction = self.inner.config.fraction;
        let probe_bytes = self.inner.config.probe_bytes;

        let started = self.inner.with_record(&key, |record| {
            if record.probe_answered {
                return None;
            }
            record.probe_answered = true;

            let target = match response
                .header("Content-Range")
                .and_then(content_range_total)
            {
                Some(total) => target_bytes(total, fraction),
                None => {
                    tracing::debug!(id = record.id, url = %record.url, "no Content-Range total, using probe length");
                    fallback_target(response.body_len, probe_bytes)
                }
            };
            record.target_bytes = Some(target);
            record.advance(ImageState::InFlight);
            tracing::debug!(id = record.id, url = %record.url, target, "probe answered");

            let request =
                FetchRequest::progressive(&record.replaced_url, &record.method, &record.headers, target);
            Some((record.id, record.candidates(), request))
        });

        if let Some(Some((id, candidates, request))) = started {
            let span = image_span(&self.inner.span, id, &key);
            let inner = Arc::clone(&self.inner);
            self.track(tokio::spawn(
                run_match(inner, key.clone(), id, candidates).instrument(span.clone()),
            ));
            let inner = Arc::clone(&self.inner);
            self.track(tokio::spawn(run_fetch(inner, key, id, request).instrument(span)));
        }
    }

    /// Waits for every image pipeline started so far.
    pub async fn settle(&self) {
        loop {
            let pending = std::mem::take(&mut *self.inner.tasks.lock().unwrap());
            if pending.is_empty() {
                break;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "image task aborted");
                }
            }
        }
    }

    pub fn record(&self, url: &str) -> Option<RecordSummary> {
        self.inner.with_record(url, |r| r.summary())
    }

    /// All records, by id.
    pub fn records(&self) -> Vec<RecordSummary> {
        let state = self.inner.state.lock().unwrap();
        let mut out: Vec<_> = state.records.values().map(ImageRecord::summary).collect();
        out.sort_by_key(|r| r.id);
        out
    }

    /// Session outcome: fails only when the navigation response was >= 400.
    pub fn finish(&self) -> Result<SessionReport, SessionError> {
        let records = self.records();
        let state = self.inner.state.lock().unwrap();
        if let Some(status) = state.navigation_error {
            return Err(SessionError::NavigationFailed {
                url: self.inner.navigation_url.clone(),
                status,
            });
        }
        Ok(SessionReport {
            navigation_url: self.inner.navigation_url.clone(),
            navigation_status: state.navigation_status,
            records,
        })
    }

    fn replaced_url(&self, url: &str) -> String {
        let config = &self.inner.config;
        if !config.rewrite {
            return url.to_string();
        }
        RuleSet::for_kind(config.rule_set).rewrite_with_targets(url, &config.rewrite_targets())
    }

    fn observe_navigation(&self, status: u16) {
        let mut state = self.inner.state.lock().unwrap();
        state.navigation_status = Some(status);
        if status >= 400 && state.navigation_error.is_none() {
            tracing::warn!(status, "navigation failed");
            state.navigation_error = Some(status);
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        self.inner.tasks.lock().unwrap().push(handle);
    }
}

async fn run_match(inner: Arc<Inner>, key: String, id: u64, candidates: Vec<String>) {
    let bindings = match find_bindings(inner.driver.as_ref(), &candidates).await {
        Ok(bindings) => bindings,
        Err(e) => {
            tracing::warn!(id, url = %key, error = %e, "DOM match failed");
            Vec::new()
        }
    };
    if bindings.is_empty() {
        tracing::debug!(id, url = %key, "no element matched");
    } else {
        tracing::debug!(id, url = %key, elements = bindings.len(), "elements matched");
    }
    inner.with_record(&key, |r| r.finish_match(bindings));
}

async fn run_fetch(inner: Arc<Inner>, key: String, id: u64, request: FetchRequest) {
    let url = request.url.clone();
    let bytes = match fetch_range(inner.transport.as_ref(), request).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(id, url = %url, error = %e, "progressive fetch failed");
            inner.with_record(&key, |r| r.fail());
            return;
        }
    };
    tracing::debug!(id, url = %url, bytes = bytes.len(), "progressive fetch complete");

    let (bytes, bindings) = match inner.with_record(&key, |r| r.finish_fetch(bytes)) {
        Some(AfterFetch::Compose(bytes, bindings)) => (bytes, bindings),
        Some(AfterFetch::Wait(matched)) => {
            if matched.await.is_err() {
                tracing::debug!(id, url = %key, "fetched bytes left unapplied");
                return;
            }
            match inner.with_record(&key, |r| r.take_for_compose()).flatten() {
                Some(parts) => parts,
                None => return,
            }
        }
        Some(AfterFetch::Unmatched) => {
            tracing::debug!(id, url = %key, "fetched bytes left unapplied");
            return;
        }
        None => return,
    };

    compose_and_apply(&inner, &key, id, bytes, bindings).await;
}

async fn compose_and_apply(
    inner: &Inner,
    key: &str,
    id: u64,
    bytes: Vec<u8>,
    bindings: Vec<Binding>,
) {
    let reflection = inner
        .config
        .reflect
        .then(|| inner.config.reflection_config());
    let built =
        tokio::task::spawn_blocking(move || build_payload(&bytes, reflection.as_ref())).await;
    let payload = match built {
        Ok(Ok(payload)) => payload,
        Ok(Err(e)) => {
            tracing::warn!(id, url = %key, error = %e, "compositing failed");
            inner.with_record(key, |r| r.fail());
            return;
        }
        Err(e) => {
            tracing::warn!(id, url = %key, error = %e, "compositor worker failed");
            inner.with_record(key, |r| r.fail());
            return;
        }
    };

    let data_uri = payload.data_uri();
    match apply_payload(inner.driver.as_ref(), &bindings, &data_uri).await {
        Ok(0) => tracing::debug!(id, url = %key, "no bound element left to update"),
        Ok(elements) => {
            inner.with_record(key, |r| r.advance(ImageState::Applied));
            tracing::info!(
                id,
                url = %key,
                elements,
                payload_bytes = payload.bytes.len(),
                "payload applied"
            );
        }
        Err(e) if e.applied > 0 => {
            inner.with_record(key, |r| r.advance(ImageState::Applied));
            tracing::warn!(
                id,
                url = %key,
                elements = e.applied,
                error = %e.source,
                "payload applied to some elements only"
            );
        }
        Err(e) => {
            tracing::warn!(id, url = %key, error = %e, "applying payload failed");
            inner.with_record(key, |r| r.fail());
        }
    }
}
