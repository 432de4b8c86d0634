//! Owning scope for state containers.
//!
//! A [`StateScope`] is the lifecycle owner a host (a screen, a view model, a
//! session) hands to its containers. It provides the two things a container
//! needs from its environment:
//!
//! 1. A way to spawn work that outlives the call that scheduled it (the
//!    container's serial lane).
//! 2. A cancellation signal fired exactly once when the owner is torn down.
//!
//! Teardown is synchronous with respect to observation: once [`StateScope::cancel`]
//! returns, no container on the scope commits another value and every observer
//! stream completes after draining what was already committed.

use crate::container::Teardown;
use crate::error::StateError;
use futures::FutureExt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Lifecycle owner for state containers
///
/// Cloning a scope yields another handle to the same lifecycle. Dropping the
/// last handle tears the scope down.
///
/// # Example
///
/// ```no_run
/// use viewstate_runtime::{StateContainer, StateScope};
///
/// # async fn example() -> Result<(), viewstate_runtime::StateError> {
/// let scope = StateScope::new()?;
/// let container = StateContainer::new(&scope, 0_u32)?;
///
/// container.mutate(|n| n + 1);
///
/// // Owner destroyed: pending mutations are abandoned, observers complete
/// scope.cancel();
/// scope.join().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct StateScope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    handle: Handle,
    token: CancellationToken,
    attached: Mutex<Attached>,
}

#[derive(Default)]
struct Attached {
    lanes: Vec<Lane>,
    /// Containers whose lane panicked and was pruned before `join`
    failed: Vec<String>,
    containers: Vec<Weak<dyn Teardown>>,
    children: Vec<Weak<ScopeInner>>,
}

struct Lane {
    container: String,
    task: JoinHandle<()>,
}

impl StateScope {
    /// Create a scope on the current tokio runtime
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NoRuntime`] when called outside a tokio runtime.
    pub fn new() -> Result<Self, StateError> {
        let handle = Handle::try_current().map_err(|_| StateError::NoRuntime)?;
        Ok(Self::with_handle(handle))
    }

    /// Create a scope whose work runs on an explicit runtime handle
    #[must_use]
    pub fn with_handle(handle: Handle) -> Self {
        tracing::debug!("Creating state scope");
        Self::from_parts(handle, CancellationToken::new())
    }

    fn from_parts(handle: Handle, token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                handle,
                token,
                attached: Mutex::new(Attached::default()),
            }),
        }
    }

    /// Create a nested scope that is torn down together with this one
    ///
    /// Cancelling the child leaves the parent untouched.
    #[must_use]
    pub fn child(&self) -> Self {
        let child = Self::from_parts(self.inner.handle.clone(), self.inner.token.child_token());

        let mut attached = self.inner.lock();
        if self.inner.token.is_cancelled() {
            drop(attached);
            child.inner.teardown();
        } else {
            attached.children.push(Arc::downgrade(&child.inner));
        }

        child
    }

    /// Spawn work that outlives the caller and stops at teardown
    ///
    /// The returned handle yields `None` if the scope was torn down before
    /// `future` completed.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let token = self.inner.token.clone();
        self.inner.handle.spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => None,
                output = future => Some(output),
            }
        })
    }

    /// Tear the scope down
    ///
    /// Fires the cancellation signal, closes every container on this scope and
    /// its children, and abandons every mutation not yet applied. Idempotent.
    pub fn cancel(&self) {
        self.inner.teardown();
    }

    /// Whether the scope has been torn down
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Wait until the scope is torn down
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await;
    }

    /// Wait for every lane spawned on this scope to exit
    ///
    /// Lanes run until the scope is torn down or every handle to their
    /// container is dropped, so call this after [`StateScope::cancel`].
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LaneFailed`] for the first lane that terminated
    /// because an update function panicked.
    pub async fn join(&self) -> Result<(), StateError> {
        let (lanes, mut failed) = {
            let mut attached = self.inner.lock();
            (
                std::mem::take(&mut attached.lanes),
                std::mem::take(&mut attached.failed),
            )
        };

        for Lane { container, task } in lanes {
            failed.extend(lane_failure(container, task.await));
        }

        failed
            .into_iter()
            .next()
            .map_or(Ok(()), |container| Err(StateError::LaneFailed { container }))
    }

    /// Token fired on teardown. Containers watch it from their lanes.
    pub(crate) fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Register a container and spawn its lane
    ///
    /// Registration and the cancellation check happen under one lock, so a
    /// container is either refused or closed by a concurrent teardown.
    pub(crate) fn attach<F>(
        &self,
        container: &str,
        teardown: Weak<dyn Teardown>,
        lane: F,
    ) -> Result<(), StateError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut attached = self.inner.lock();
        if self.inner.token.is_cancelled() {
            return Err(StateError::ScopeCancelled);
        }

        attached.containers.retain(|weak| weak.strong_count() > 0);
        attached.prune_finished_lanes();

        let task = self.inner.handle.spawn(lane);
        attached.containers.push(teardown);
        attached.lanes.push(Lane {
            container: container.to_owned(),
            task,
        });

        Ok(())
    }
}

impl Attached {
    /// Drop the handles of lanes that already exited, keeping their failures
    fn prune_finished_lanes(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.lanes)
            .into_iter()
            .partition(|lane| lane.task.is_finished());
        self.lanes = running;

        for mut lane in finished {
            match (&mut lane.task).now_or_never() {
                Some(outcome) => self.failed.extend(lane_failure(lane.container, outcome)),
                // Out of coop budget; `join` will collect it
                None => self.lanes.push(lane),
            }
        }
    }
}

/// Log how a lane exited, returning its container's name if it panicked
fn lane_failure(container: String, outcome: Result<(), JoinError>) -> Option<String> {
    match outcome {
        Ok(()) => None,
        Err(error) if error.is_panic() => {
            tracing::error!(container = %container, "Serial lane terminated by a panic");
            Some(container)
        },
        Err(error) => {
            tracing::debug!(container = %container, %error, "Serial lane task cancelled");
            None
        },
    }
}

impl std::fmt::Debug for StateScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let attached = self.inner.lock();
        f.debug_struct("StateScope")
            .field("cancelled", &self.inner.token.is_cancelled())
            .field("lanes", &attached.lanes.len())
            .field("children", &attached.children.len())
            .finish_non_exhaustive()
    }
}

impl ScopeInner {
    fn lock(&self) -> std::sync::MutexGuard<'_, Attached> {
        self.attached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn teardown(&self) {
        // Cancel before taking the lock: `attach` re-checks under the lock
        self.token.cancel();

        let (containers, children) = {
            let mut attached = self.lock();
            (
                std::mem::take(&mut attached.containers),
                std::mem::take(&mut attached.children),
            )
        };

        if containers.is_empty() && children.is_empty() {
            return;
        }

        tracing::debug!(
            containers = containers.len(),
            children = children.len(),
            "Tearing down state scope"
        );

        for container in containers.iter().filter_map(Weak::upgrade) {
            container.close();
        }
        for child in children.iter().filter_map(Weak::upgrade) {
            child.teardown();
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.teardown();
    }
}
