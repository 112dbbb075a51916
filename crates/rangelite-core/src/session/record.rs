//! Per-image record and the match/fetch rendezvous.

use crate::intercept::Headers;
use crate::matcher::Binding;
use tokio::sync::oneshot;

/// Lifecycle of one image. Moves forward only, except into `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageState {
    /// Probe range sent, waiting for its response.
    Probing,
    /// Progressive fetch and DOM match running.
    InFlight,
    /// Progressive bytes stored.
    Ready,
    /// Payload written into at least one bound element.
    Applied,
    Failed,
}

impl ImageState {
    fn rank(self) -> u8 {
        match self {
            ImageState::Probing => 0,
            ImageState::InFlight => 1,
            ImageState::Ready => 2,
            ImageState::Applied => 3,
            ImageState::Failed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ImageState::Applied | ImageState::Failed)
    }
}

/// What the fetch path should do after storing its bytes.
#[derive(Debug)]
pub(crate) enum AfterFetch {
    /// Bindings already known: compose with these.
    Compose(Vec<u8>, Vec<Binding>),
    /// Wait for the match; a dropped sender means nothing matched.
    Wait(oneshot::Receiver<()>),
    /// The match already finished without bindings.
    Unmatched,
}

/// One distinct image URL observed on the page.
#[derive(Debug)]
pub struct ImageRecord {
    pub id: u64,
    pub url: String,
    /// Redirect hops after `url`, in order.
    pub redirect_urls: Vec<String>,
    /// URL the progressive fetch goes to; `url` when rewriting is off.
    pub replaced_url: String,
    pub method: String,
    /// Captured request headers, `Range` included.
    pub headers: Headers,
    pub matched: bool,
    pub bindings: Vec<Binding>,
    pub fetched: Option<Vec<u8>>,
    pub state: ImageState,
    pub target_bytes: Option<u64>,
    pub(crate) probe_answered: bool,
    match_done: bool,
    waiter: Option<oneshot::Sender<()>>,
}

impl ImageRecord {
    pub(crate) fn new(
        id: u64,
        url: String,
        replaced_url: String,
        method: String,
        headers: Headers,
    ) -> Self {
        Self {
            id,
            url,
            redirect_urls: Vec::new(),
            replaced_url,
            method,
            headers,
            matched: false,
            bindings: Vec::new(),
            fetched: None,
            state: ImageState::Probing,
            target_bytes: None,
            probe_answered: false,
            match_done: false,
            waiter: None,
        }
    }

    /// URLs an element may show this image under: the request URL, then redirect hops.
    pub fn candidates(&self) -> Vec<String> {
        std::iter::once(self.url.clone())
            .chain(self.redirect_urls.iter().cloned())
            .collect()
    }

    pub(crate) fn push_redirect(&mut self, url: &str) {
        if url != self.url && !self.redirect_urls.iter().any(|u| u == url) {
            self.redirect_urls.push(url.to_string());
        }
    }

    /// Moves to `next` unless that would go backwards or leave a terminal state.
    pub(crate) fn advance(&mut self, next: ImageState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        if next != ImageState::Failed && next.rank() <= self.state.rank() {
            return false;
        }
        self.state = next;
        true
    }

    pub(crate) fn fail(&mut self) {
        self.advance(ImageState::Failed);
        self.fetched = None;
        self.waiter = None;
    }

    /// Stores the match result and wakes a waiting fetch.
    pub(crate) fn finish_match(&mut self, bindings: Vec<Binding>) {
        self.match_done = true;
        if !bindings.is_empty() && !self.matched {
            self.matched = true;
            self.bindings = bindings;
        }
        if let Some(tx) = self.waiter.take() {
            if self.matched {
                let _ = tx.send(());
            }
        }
    }

    /// Stores the progressive bytes and decides how the fetch path continues.
    pub(crate) fn finish_fetch(&mut self, bytes: Vec<u8>) -> AfterFetch {
        self.advance(ImageState::Ready);
        if self.matched {
            return AfterFetch::Compose(bytes, self.bindings.clone());
        }
        self.fetched = Some(bytes);
        if self.match_done {
            return AfterFetch::Unmatched;
        }
        let (tx, rx) = oneshot::channel();
        self.waiter = Some(tx);
        AfterFetch::Wait(rx)
    }

    /// Hands the stored bytes and bindings to the compositor, once.
    pub(crate) fn take_for_compose(&mut self) -> Option<(Vec<u8>, Vec<Binding>)> {
        if !self.matched {
            return None;
        }
        let bytes = self.fetched.take()?;
        Some((bytes, self.bindings.clone()))
    }

    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            id: self.id,
            url: self.url.clone(),
            replaced_url: self.replaced_url.clone(),
            redirect_urls: self.redirect_urls.clone(),
            state: self.state,
            matched: self.matched,
            bindings: self.bindings.len(),
            target_bytes: self.target_bytes,
        }
    }
}

/// Read-only snapshot of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    pub id: u64,
    pub url: String,
    pub replaced_url: String,
    pub redirect_urls: Vec<String>,
    pub state: ImageState,
    pub matched: bool,
    pub bindings: usize,
    pub target_bytes: Option<u64>,
}
