//! The single-slot video store.
//!
//! `VideoSlot` owns the only copy of [`VideoState`] in the process. Reads are
//! served from memory; writes update memory first and then persist through
//! [`StateBackends`]. Persistence failures are logged and reported as a
//! [`SaveOutcome`], never raised: the in-memory value stays authoritative until
//! the process restarts, at which point the last durably saved value is loaded
//! again.
//!
//! The backend is read once per process (see [`VideoSlot::ensure_loaded`]).
//! Another instance writing the same backend afterwards is not observed until
//! restart; request/response deployments accept that staleness in exchange for
//! not hitting the backend on every update.

use crate::storage::{BackendKind, KvBackend, StateBackends, StorageError, VIDEO_STATE_KEY};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// The persisted video reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoState {
    /// Platform-issued `file_id` of the stored video
    #[serde(alias = "stored_video")]
    pub video_reference: Option<String>,
    /// When the slot last changed (set or clear)
    pub stored_at: Option<DateTime<Utc>>,
}

impl VideoState {
    /// An empty state, cleared at `at`.
    #[must_use]
    pub const fn cleared(at: DateTime<Utc>) -> Self {
        Self {
            video_reference: None,
            stored_at: Some(at),
        }
    }

    /// A state holding `reference`, stored at `at`.
    #[must_use]
    pub fn stored(reference: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            video_reference: Some(reference.into()),
            stored_at: Some(at),
        }
    }

    /// The stored reference; empty strings count as no video.
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.video_reference.as_deref().filter(|r| !r.is_empty())
    }

    /// Returns true if a video is stored.
    #[must_use]
    pub fn has_video(&self) -> bool {
        self.reference().is_some()
    }
}

/// Result of persisting the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written to the authoritative backend
    Persisted(BackendKind),
    /// The remote backend failed; written to the fallback instead
    FellBack(BackendKind),
    /// Nothing durable was written; the value lives in memory only
    Failed,
}

impl SaveOutcome {
    /// Returns true if the value will survive a restart.
    #[must_use]
    pub const fn is_durable(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// Process-wide holder of the current video reference.
pub struct VideoSlot {
    state: RwLock<VideoState>,
    backends: StateBackends,
    loaded: OnceCell<()>,
}

impl VideoSlot {
    /// Create an empty, not yet loaded slot.
    #[must_use]
    pub fn new(backends: StateBackends) -> Self {
        Self {
            state: RwLock::new(VideoState::default()),
            backends,
            loaded: OnceCell::new(),
        }
    }

    /// Load from the backends once per process; later calls return immediately.
    pub async fn ensure_loaded(&self) {
        self.loaded
            .get_or_init(|| async {
                self.load().await;
            })
            .await;
    }

    /// Returns true once the cold-start load has completed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Read the state from the backends into memory.
    ///
    /// Both the remote backend and the file are read; when both hold a state
    /// the later `stored_at` wins, ties going to the remote. A value written to
    /// the file during a remote outage therefore outlives the older remote
    /// copy. Unreadable backends contribute nothing; if neither yields a state
    /// the slot becomes empty.
    pub async fn load(&self) -> VideoState {
        let state = self.read_backends().await;
        match state.reference() {
            Some(reference) => info!("Video state loaded (id …{})", tail(reference)),
            None => info!("Video state loaded: no video stored"),
        }
        self.replace(state.clone());
        state
    }

    async fn read_backends(&self) -> VideoState {
        let fallback = self.backends.fallback.as_ref();

        let remote = match &self.backends.primary {
            Some(primary) => match read_state(primary.as_ref()).await {
                Ok(state) => {
                    if state.is_none() {
                        debug!("No video state in {} backend", primary.kind());
                    }
                    state
                }
                Err(e) => {
                    warn!(
                        "Failed to load video state from {} backend: {}",
                        primary.kind(),
                        e
                    );
                    None
                }
            },
            None => None,
        };

        let local = match read_state(fallback).await {
            Ok(state) => state,
            Err(e) => {
                error!(
                    "Failed to load video state from {} backend: {}",
                    fallback.kind(),
                    e
                );
                None
            }
        };

        match (remote, local) {
            (Some(remote), Some(local)) => {
                if local.stored_at > remote.stored_at {
                    info!(
                        "{} backend holds a newer video state than the remote store, using it",
                        fallback.kind()
                    );
                    local
                } else {
                    remote
                }
            }
            (Some(state), None) | (None, Some(state)) => state,
            (None, None) => VideoState::default(),
        }
    }

    /// Persist `state`.
    ///
    /// A configured remote backend is authoritative and the file is left
    /// untouched; if the remote write fails the file is written instead.
    pub async fn save(&self, state: &VideoState) -> SaveOutcome {
        let value = match serde_json::to_string(state) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to serialize video state: {}", e);
                return SaveOutcome::Failed;
            }
        };

        let fallback = self.backends.fallback.as_ref();

        if let Some(primary) = &self.backends.primary {
            match primary.set(VIDEO_STATE_KEY, &value).await {
                Ok(()) => {
                    info!("Video state saved to {} backend", primary.kind());
                    return SaveOutcome::Persisted(primary.kind());
                }
                Err(e) => {
                    warn!(
                        "Failed to save video state to {} backend, falling back to {}: {}",
                        primary.kind(),
                        fallback.kind(),
                        e
                    );
                    return match fallback.set(VIDEO_STATE_KEY, &value).await {
                        Ok(()) => SaveOutcome::FellBack(fallback.kind()),
                        Err(e) => {
                            error!(
                                "Failed to save video state to {} backend: {}. Keeping it in memory only.",
                                fallback.kind(),
                                e
                            );
                            SaveOutcome::Failed
                        }
                    };
                }
            }
        }

        match fallback.set(VIDEO_STATE_KEY, &value).await {
            Ok(()) => {
                info!("Video state saved to {} backend", fallback.kind());
                SaveOutcome::Persisted(fallback.kind())
            }
            Err(e) => {
                error!(
                    "Failed to save video state to {} backend: {}. Keeping it in memory only.",
                    fallback.kind(),
                    e
                );
                SaveOutcome::Failed
            }
        }
    }

    /// Replace the stored video with `reference` and persist it.
    pub async fn set(&self, reference: impl Into<String>) -> SaveOutcome {
        self.ensure_loaded().await;
        let state = VideoState::stored(reference, self.next_stamp());
        if let Some(reference) = state.reference() {
            info!("Video stored (id …{})", tail(reference));
        }
        self.replace(state.clone());
        self.save(&state).await
    }

    /// Drop the stored video and persist the empty state.
    pub async fn clear(&self) -> SaveOutcome {
        self.ensure_loaded().await;
        let state = VideoState::cleared(self.next_stamp());
        info!("Video cleared");
        self.replace(state.clone());
        self.save(&state).await
    }

    /// The in-memory reference. Never touches the backend.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .reference()
            .map(str::to_owned)
    }

    /// A copy of the full in-memory state.
    #[must_use]
    pub fn snapshot(&self) -> VideoState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Now, but strictly after the current `stored_at` so that load can order writes.
    fn next_stamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.snapshot().stored_at {
            Some(prev) if prev >= now => prev + TimeDelta::microseconds(1),
            _ => now,
        }
    }

    fn replace(&self, state: VideoState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

async fn read_state(backend: &dyn KvBackend) -> Result<Option<VideoState>, StorageError> {
    match backend.get(VIDEO_STATE_KEY).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// The last `n` characters of a reference, for logs and status lines.
#[must_use]
pub fn tail_chars(reference: &str, n: usize) -> &str {
    let count = reference.chars().count();
    if count <= n {
        return reference;
    }
    reference
        .char_indices()
        .nth(count - n)
        .map_or(reference, |(pos, _)| &reference[pos..])
}

fn tail(reference: &str) -> &str {
    tail_chars(reference, 8)
}
