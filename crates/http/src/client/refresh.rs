//! Single-flight token refresh
//!
//! When several requests hit `401` at once, only the first one calls the
//! refresh endpoint. The others attach to the same pending future and observe
//! its outcome, so the server sees exactly one refresh and every caller agrees
//! on the new token (or on the failure).
//!
//! The pending handle lives in a [`RefreshCoordinator`] owned by the client,
//! not in a global, so independently built clients refresh independently.

use crate::types::RefreshResponse;
use futures::FutureExt;
use futures::future::Shared;
use portal_core::SessionStore;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;
use tracing::{debug, warn};

/// Why a refresh did not produce a token
///
/// Cloneable because every caller attached to a refresh receives its own copy
/// of the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// The refresh endpoint answered with a non-success status
    #[error("refresh rejected with status {status}")]
    Rejected { status: u16 },

    /// The response decoded but carried no token
    #[error("refresh response did not contain a token")]
    MissingToken,

    /// The response body was not the expected JSON
    #[error("refresh response could not be decoded: {0}")]
    InvalidBody(String),

    /// No response was received
    #[error("refresh request failed: {0}")]
    Network(String),

    /// The new token could not be persisted
    #[error("refreshed token could not be stored: {0}")]
    Storage(String),

    /// The refresh task panicked before producing an outcome
    #[error("refresh task aborted")]
    Aborted,
}

/// Result shared by every caller of one refresh
pub type RefreshOutcome = Result<String, RefreshError>;

#[cfg(not(target_arch = "wasm32"))]
pub(crate) type RefreshFuture = futures::future::BoxFuture<'static, RefreshOutcome>;
#[cfg(target_arch = "wasm32")]
pub(crate) type RefreshFuture = futures::future::LocalBoxFuture<'static, RefreshOutcome>;

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn boxed<F>(future: F) -> RefreshFuture
where
    F: Future<Output = RefreshOutcome> + Send + 'static,
{
    future.boxed()
}

#[cfg(target_arch = "wasm32")]
pub(crate) fn boxed<F>(future: F) -> RefreshFuture
where
    F: Future<Output = RefreshOutcome> + 'static,
{
    future.boxed_local()
}

struct Pending {
    id: u64,
    future: Shared<RefreshFuture>,
}

/// Coordination cell holding at most one in-flight refresh
#[derive(Default)]
pub struct RefreshCoordinator {
    pending: Mutex<Option<Pending>>,
    started: AtomicU64,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("started", &self.refresh_count())
            .finish()
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a refresh is currently in flight
    pub fn is_refreshing(&self) -> bool {
        self.lock().is_some()
    }

    /// Number of refreshes started over the coordinator's lifetime
    pub fn refresh_count(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Await the in-flight refresh, starting one with `start` if none is
    /// pending
    ///
    /// `start` is only called when this caller becomes the leader. The
    /// pending handle is cleared as soon as the refresh settles; a panicking
    /// refresh settles as [`RefreshError::Aborted`].
    pub(crate) async fn run<F>(self: &Arc<Self>, start: F) -> RefreshOutcome
    where
        F: FnOnce() -> RefreshFuture,
    {
        let shared = {
            let mut pending = self.lock();
            match pending.as_ref() {
                Some(existing) => {
                    debug!(refresh_id = existing.id, "Joining in-flight token refresh");
                    existing.future.clone()
                }
                None => {
                    let id = self.started.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!(refresh_id = id, "Starting token refresh");

                    let guard = SettleGuard {
                        cell: Arc::downgrade(self),
                        id,
                    };
                    let refresh = AssertUnwindSafe(start()).catch_unwind();
                    let future = boxed(async move {
                        let _guard = guard;
                        refresh.await.unwrap_or_else(|_| {
                            warn!("Token refresh task panicked");
                            Err(RefreshError::Aborted)
                        })
                    })
                    .shared();

                    *pending = Some(Pending {
                        id,
                        future: future.clone(),
                    });
                    future
                }
            }
        };

        shared.await
    }
}

/// Clears the pending slot when the refresh it belongs to finishes
struct SettleGuard {
    cell: Weak<RefreshCoordinator>,
    id: u64,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        let Some(cell) = self.cell.upgrade() else {
            return;
        };
        let mut pending = cell.lock();
        if pending.as_ref().is_some_and(|p| p.id == self.id) {
            *pending = None;
        }
    }
}

/// Call the refresh endpoint and store the new token
///
/// Any failure clears the session before it is reported.
pub(crate) async fn perform_refresh(
    request: reqwest::RequestBuilder,
    session: Arc<SessionStore>,
) -> RefreshOutcome {
    let outcome = match fetch_token(request).await {
        Ok(token) => session
            .renew(&token)
            .map(|()| token)
            .map_err(|e| RefreshError::Storage(e.to_string())),
        Err(err) => Err(err),
    };

    match &outcome {
        Ok(_) => debug!("Token refresh succeeded"),
        Err(err) => {
            warn!("Token refresh failed: {err}");
            if let Err(clear_err) = session.clear_session() {
                warn!("Failed to clear session after refresh failure: {clear_err}");
            }
        }
    }
    outcome
}

async fn fetch_token(request: reqwest::RequestBuilder) -> Result<String, RefreshError> {
    let response = request
        .send()
        .await
        .map_err(|e| RefreshError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RefreshError::Rejected {
            status: status.as_u16(),
        });
    }

    let body: RefreshResponse = response
        .json()
        .await
        .map_err(|e| RefreshError::InvalidBody(e.to_string()))?;

    match body.token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(RefreshError::MissingToken),
    }
}
