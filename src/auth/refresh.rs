//! Single-flight coordination of token refreshes
//!
//! When several requests hit a 401 at the same time, only the first one to
//! arrive issues the refresh call. Everyone else awaits the same outcome.
//!
//! ```text
//!   trigger ──► slot empty? ──yes──► install cycle N, run refresh ──┐
//!                  │                                                │
//!                  no                                               ▼
//!                  └──────────► clone cycle N ───────────► await shared outcome
//!                                                                   │
//!                                     cycle N settles: clear slot ◄─┘
//! ```
//!
//! The slot is a mutex-guarded "start-or-join": whichever trigger takes the
//! lock while the slot is empty owns the cycle. The lock is never held
//! across an await.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::types::RefreshGrant;

type CycleOutcome = Shared<BoxFuture<'static, Option<RefreshGrant>>>;

/// One outstanding refresh cycle
struct InFlight {
    id: u64,
    outcome: CycleOutcome,
}

#[derive(Default)]
struct CoordinatorInner {
    slot: Mutex<Option<InFlight>>,
    cycles_started: AtomicU64,
}

impl CoordinatorInner {
    /// Clear the slot if it still holds cycle `id`
    fn finish(&self, id: u64) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|in_flight| in_flight.id == id) {
            *slot = None;
        }
    }
}

/// Collapses concurrent refresh needs into one network call.
///
/// Cloning yields another handle to the same coordinator.
#[derive(Clone, Default)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("in_flight", &self.is_in_flight())
            .field("cycles_started", &self.cycles_started())
            .finish()
    }
}

impl RefreshCoordinator {
    /// Create an idle coordinator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a refresh cycle, or join the one already in flight.
    ///
    /// `start` is invoked only when no cycle is in flight; its future is the
    /// refresh call. Every caller of the same cycle receives the same
    /// outcome. `None` means the refresh failed, for whatever reason.
    pub async fn run<F, Fut>(&self, start: F) -> Option<RefreshGrant>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<RefreshGrant>> + Send + 'static,
    {
        let outcome = {
            let mut slot = self
                .inner
                .slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match slot.as_ref() {
                Some(in_flight) => {
                    tracing::trace!(cycle = in_flight.id, "Joining in-flight refresh");
                    in_flight.outcome.clone()
                }
                None => {
                    let id = self.inner.cycles_started.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::debug!(cycle = id, "Starting refresh cycle");

                    let refresh = start();
                    let owner: Weak<CoordinatorInner> = Arc::downgrade(&self.inner);
                    let outcome = async move {
                        let grant = refresh.await;
                        if let Some(inner) = owner.upgrade() {
                            inner.finish(id);
                        }
                        tracing::debug!(cycle = id, success = grant.is_some(), "Refresh cycle settled");
                        grant
                    }
                    .boxed()
                    .shared();

                    *slot = Some(InFlight {
                        id,
                        outcome: outcome.clone(),
                    });
                    outcome
                }
            }
        };

        outcome.await
    }

    /// True while a cycle is outstanding
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Number of cycles started so far (i.e. refresh calls issued)
    #[must_use]
    pub fn cycles_started(&self) -> u64 {
        self.inner.cycles_started.load(Ordering::SeqCst)
    }
}
