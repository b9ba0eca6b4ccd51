//! Decoded-bitmap cache keyed by exact URL.
//!
//! Loads run on worker threads. [`ImageLoader::status`] never blocks;
//! [`ImageLoader::load`] waits on a channel until the bitmap is ready, the load
//! fails, or the loader timeout elapses. Concurrent requests for the same URL
//! join the in-flight load instead of fetching again. A URL that failed both
//! fetch attempts stays failed until [`ImageLoader::retry`].

mod fetch;

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use image::RgbaImage;
use thiserror::Error;

pub use fetch::HttpFetcher;

pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

pub type LoadedImage = Arc<RgbaImage>;
pub type LoadResult = Result<LoadedImage, ImageLoadError>;

/// Cross-origin handling requested for one fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Credential-less request; tried first.
    Anonymous,
    /// Plain request without cross-origin restrictions; the single retry.
    Unrestricted,
}

const FETCH_ATTEMPTS: [FetchMode; 2] = [FetchMode::Anonymous, FetchMode::Unrestricted];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected http status {0}")]
    Status(u16),
    #[error("invalid data url: {0}")]
    InvalidDataUrl(String),
    #[error("cannot read {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Source of raw image bytes. Implementations must be callable from worker threads.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str, mode: FetchMode) -> Result<Vec<u8>, FetchError>;
}

impl<T: ImageFetcher + ?Sized> ImageFetcher for Arc<T> {
    fn fetch(&self, url: &str, mode: FetchMode) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(url, mode)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageLoadError {
    #[error("image {url} could not be loaded: {reason}")]
    Unavailable { url: String, reason: String },
    #[error("image {url} did not load within {timeout:?}")]
    TimedOut { url: String, timeout: Duration },
}

impl ImageLoadError {
    pub fn url(&self) -> &str {
        match self {
            Self::Unavailable { url, .. } | Self::TimedOut { url, .. } => url,
        }
    }

    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

/// Non-blocking view of one URL's load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    Ready(LoadedImage),
    Pending,
    Failed(ImageLoadError),
}

#[derive(Default)]
struct LoaderState {
    cache: HashMap<String, LoadedImage>,
    failed: HashMap<String, ImageLoadError>,
    in_flight: HashMap<String, Vec<Sender<LoadResult>>>,
}

enum LoadRequest {
    Ready(LoadedImage),
    Failed(ImageLoadError),
    Pending(Option<mpsc::Receiver<LoadResult>>),
}

pub struct ImageLoader<F> {
    fetcher: Arc<F>,
    state: Arc<Mutex<LoaderState>>,
    timeout: Duration,
}

impl<F> Clone for ImageLoader<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            state: Arc::clone(&self.state),
            timeout: self.timeout,
        }
    }
}

impl<F: ImageFetcher + 'static> ImageLoader<F> {
    pub fn new(fetcher: F, timeout: Duration) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            state: Arc::new(Mutex::new(LoaderState::default())),
            timeout,
        }
    }

    pub fn cached(&self, url: &str) -> Option<LoadedImage> {
        self.lock_state().cache.get(url).cloned()
    }

    pub fn is_in_flight(&self, url: &str) -> bool {
        self.lock_state().in_flight.contains_key(url)
    }

    pub fn cache_len(&self) -> usize {
        self.lock_state().cache.len()
    }

    pub fn failure(&self, url: &str) -> Option<ImageLoadError> {
        self.lock_state().failed.get(url).cloned()
    }

    /// Starts loading `url` in the background without waiting for it.
    pub fn prefetch(&self, url: &str) {
        let _ = self.request(url, false);
    }

    /// Current state of `url`, starting a background load if none exists yet.
    pub fn status(&self, url: &str) -> LoadStatus {
        match self.request(url, false) {
            LoadRequest::Ready(image) => LoadStatus::Ready(image),
            LoadRequest::Failed(err) => LoadStatus::Failed(err),
            LoadRequest::Pending(_) => LoadStatus::Pending,
        }
    }

    /// Forgets a remembered failure for `url` and fetches it again.
    pub fn retry(&self, url: &str) {
        if self.lock_state().failed.remove(url).is_some() {
            tracing::debug!(url, "retrying failed image");
        }
        self.prefetch(url);
    }

    /// Returns the decoded bitmap for `url`, waiting at most the loader timeout.
    pub fn load(&self, url: &str) -> LoadResult {
        match self.request(url, true) {
            LoadRequest::Ready(image) => Ok(image),
            LoadRequest::Failed(err) => Err(err),
            LoadRequest::Pending(None) => Err(ImageLoadError::Unavailable {
                url: url.to_string(),
                reason: "no waiter registered".to_string(),
            }),
            LoadRequest::Pending(Some(receiver)) => match receiver.recv_timeout(self.timeout) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(url, timeout = ?self.timeout, "image load timed out");
                    Err(ImageLoadError::TimedOut {
                        url: url.to_string(),
                        timeout: self.timeout,
                    })
                }
                Err(RecvTimeoutError::Disconnected) => Err(ImageLoadError::Unavailable {
                    url: url.to_string(),
                    reason: "loader worker exited".to_string(),
                }),
            },
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request(&self, url: &str, wait: bool) -> LoadRequest {
        let mut state = self.lock_state();
        if let Some(image) = state.cache.get(url) {
            tracing::trace!(url, "image cache hit");
            return LoadRequest::Ready(Arc::clone(image));
        }
        if let Some(err) = state.failed.get(url) {
            return LoadRequest::Failed(err.clone());
        }

        let already_loading = state.in_flight.contains_key(url);
        let waiters = state.in_flight.entry(url.to_string()).or_default();
        let receiver = if wait {
            let (sender, receiver) = mpsc::channel();
            waiters.push(sender);
            Some(receiver)
        } else {
            None
        };
        if already_loading {
            tracing::debug!(url, "joining in-flight image load");
            return LoadRequest::Pending(receiver);
        }
        drop(state);

        self.spawn_worker(url.to_string());
        LoadRequest::Pending(receiver)
    }

    fn spawn_worker(&self, url: String) {
        let fetcher = Arc::clone(&self.fetcher);
        let state = Arc::clone(&self.state);
        let worker_url = url.clone();
        let spawned = std::thread::Builder::new()
            .name("image-loader".to_string())
            .spawn(move || {
                let result = fetch_and_decode(fetcher.as_ref(), &worker_url);
                complete_load(&state, &worker_url, result);
            });

        if let Err(err) = spawned {
            tracing::error!(url = %url, ?err, "failed to spawn image loader worker");
            complete_load(
                &self.state,
                &url,
                Err(ImageLoadError::Unavailable {
                    url: url.clone(),
                    reason: format!("cannot spawn loader worker: {err}"),
                }),
            );
        }
    }
}

fn complete_load(state: &Mutex<LoaderState>, url: &str, result: LoadResult) {
    let waiters = {
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        match &result {
            Ok(image) => {
                state.cache.insert(url.to_string(), Arc::clone(image));
            }
            Err(err) => {
                state.failed.insert(url.to_string(), err.clone());
            }
        }
        state.in_flight.remove(url).unwrap_or_default()
    };
    for waiter in waiters {
        let _ = waiter.send(result.clone());
    }
}

fn fetch_and_decode<F: ImageFetcher + ?Sized>(fetcher: &F, url: &str) -> LoadResult {
    let mut last_reason = String::new();
    for mode in FETCH_ATTEMPTS {
        let attempt = fetcher
            .fetch(url, mode)
            .map_err(|err| err.to_string())
            .and_then(|bytes| decode_rgba(&bytes));
        match attempt {
            Ok(image) => {
                tracing::debug!(
                    url,
                    ?mode,
                    width = image.width(),
                    height = image.height(),
                    "image decoded"
                );
                return Ok(image);
            }
            Err(reason) => {
                tracing::warn!(url, ?mode, %reason, "image fetch attempt failed");
                last_reason = reason;
            }
        }
    }
    Err(ImageLoadError::Unavailable {
        url: url.to_string(),
        reason: last_reason,
    })
}

fn decode_rgba(bytes: &[u8]) -> Result<LoadedImage, String> {
    image::load_from_memory(bytes)
        .map(|decoded| Arc::new(decoded.to_rgba8()))
        .map_err(|err| format!("decode failed: {err}"))
}
