//! The state container.
//!
//! A [`StateContainer`] owns the current value of a piece of immutable state.
//! Every mutation is scheduled onto a single serial lane: one task per
//! container draining an unbounded FIFO queue of update functions. Each update
//! reads the latest committed value, computes the next one and commits it;
//! update functions therefore never interleave, and the value after N
//! mutations is the left fold of those updates over the initial value.
//!
//! Committed values fan out to subscribers from inside the same critical
//! section that replaces the current value, so a subscription is seeded with
//! exactly the value current at subscription time and then receives every
//! later commit once, in commit order.

use crate::config::{ContainerConfig, PanicPolicy};
use crate::error::StateError;
use crate::metrics::{ContainerMetrics, Suppression};
use crate::observable::{Selected, StateStream};
use crate::scope::StateScope;
use crate::selection::{Joined, Selection};
use smallvec::SmallVec;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use viewstate_core::{Getter, Update, update};

/// Something a scope closes synchronously on teardown
pub(crate) trait Teardown: Send + Sync {
    fn close(&self);
}

/// Work item on a serial lane
enum Job<T> {
    /// Apply an update and commit its result
    Update {
        update: Update<T>,
        done: oneshot::Sender<()>,
    },
    /// Resolve once every earlier job has been handled
    Barrier(oneshot::Sender<()>),
}

struct Shared<T> {
    name: String,
    initial: T,
    token: CancellationToken,
    panic_policy: PanicPolicy,
    distinct: Option<fn(&T, &T) -> bool>,
    registry: Mutex<Registry<T>>,
}

struct Registry<T> {
    current: Arc<T>,
    subscribers: SmallVec<[mpsc::UnboundedSender<T>; 4]>,
    closed: bool,
}

impl<T> Shared<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Arc<T> {
        Arc::clone(&self.lock().current)
    }

    fn subscribe(&self) -> StateStream<T> {
        let (subscriber, receiver) = mpsc::unbounded_channel();

        let mut registry = self.lock();
        if !registry.closed && subscriber.send((*registry.current).clone()).is_ok() {
            registry.subscribers.push(subscriber);
            ContainerMetrics::set_subscribers(&self.name, registry.subscribers.len());
        }

        StateStream::new(receiver)
    }

    /// Replace the current value and notify subscribers
    ///
    /// Returns `false` if the container was closed first; the value is then
    /// discarded.
    fn commit(&self, next: T) -> bool {
        let mut registry = self.lock();
        if registry.closed {
            return false;
        }

        if let Some(eq) = self.distinct {
            if eq(&*registry.current, &next) {
                ContainerMetrics::record_suppressed(Suppression::State);
                return true;
            }
        }

        let before = registry.subscribers.len();
        registry
            .subscribers
            .retain(|subscriber| subscriber.send(next.clone()).is_ok());
        if registry.subscribers.len() != before {
            ContainerMetrics::set_subscribers(&self.name, registry.subscribers.len());
        }

        registry.current = Arc::new(next);
        true
    }

    fn run(&self, job: Job<T>) {
        let (update, done) = match job {
            Job::Barrier(done) => {
                let _ = done.send(());
                return;
            },
            Job::Update { update, done } => (update, done),
        };

        let base = self.snapshot();
        let started = Instant::now();
        let next = match self.panic_policy {
            PanicPolicy::Propagate => update(&*base),
            PanicPolicy::Isolate => {
                match std::panic::catch_unwind(AssertUnwindSafe(|| update(&*base))) {
                    Ok(next) => next,
                    Err(_) => {
                        ContainerMetrics::record_panicked(&self.name);
                        tracing::error!("Update function panicked, mutation discarded");
                        return;
                    },
                }
            },
        };
        let elapsed = started.elapsed();

        if self.commit(next) {
            ContainerMetrics::record_applied(&self.name, elapsed);
            tracing::trace!(elapsed_us = elapsed.as_micros(), "Mutation applied");
            let _ = done.send(());
        }
    }
}

impl<T> Teardown for Shared<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn close(&self) {
        let mut registry = self.lock();
        if registry.closed {
            return;
        }

        registry.closed = true;
        let subscribers = registry.subscribers.len();
        registry.subscribers.clear();
        drop(registry);

        ContainerMetrics::set_subscribers(&self.name, 0);
        tracing::debug!(container = %self.name, subscribers, "Container closed");
    }
}

/// Closes the container when the lane exits, including by unwinding
struct CloseOnExit<T>(Arc<Shared<T>>)
where
    T: Clone + Send + Sync + 'static;

impl<T> Drop for CloseOnExit<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if std::thread::panicking() {
            ContainerMetrics::record_panicked(&self.0.name);
            tracing::error!(container = %self.0.name, "Serial lane terminated by a panicking update");
        }
        self.0.close();
    }
}

/// The serial lane: applies jobs one at a time, in FIFO order, until the
/// scope is torn down or every container handle is gone
async fn run_lane<T>(shared: Arc<Shared<T>>, mut queue: mpsc::UnboundedReceiver<Job<T>>)
where
    T: Clone + Send + Sync + 'static,
{
    let _close = CloseOnExit(Arc::clone(&shared));
    tracing::debug!("Serial lane started");

    loop {
        let job = tokio::select! {
            biased;
            () = shared.token.cancelled() => break,
            job = queue.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        shared.run(job);
    }

    queue.close();
    let mut abandoned = 0;
    while let Ok(job) = queue.try_recv() {
        if matches!(job, Job::Update { .. }) {
            abandoned += 1;
        }
    }
    ContainerMetrics::record_abandoned(&shared.name, abandoned);
    tracing::debug!(abandoned, "Serial lane stopped");
}

/// Handle for a scheduled mutation
///
/// Returned by [`StateContainer::mutate`] and
/// [`Reducer::dispatch`](crate::Reducer::dispatch). Dropping it does not
/// cancel the mutation: scheduling is fire-and-forget, and the handle only
/// lets a caller find out when (or whether) the update was committed.
#[derive(Debug)]
pub struct MutationHandle {
    applied: oneshot::Receiver<()>,
}

impl MutationHandle {
    /// Wait until the mutation has been committed
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Abandoned`] if the scope was torn down before the
    /// lane reached this mutation, or if its update function panicked.
    pub async fn applied(self) -> Result<(), StateError> {
        self.applied.await.map_err(|_| StateError::Abandoned)
    }
}

/// Observable holder of an immutable value with serialized mutations
///
/// Cloning yields another handle to the same container. The lane keeps
/// running while any handle is alive and the owning scope has not been torn
/// down.
///
/// # Type Parameters
///
/// - `T`: The state type. Values are cloned out to readers and subscribers;
///   wrap large states in `Arc` to make that cheap.
///
/// # Example
///
/// ```no_run
/// use futures::StreamExt;
/// use viewstate_runtime::{getter, StateContainer, StateScope};
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Form {
///     email: String,
///     submitting: bool,
/// }
///
/// # async fn example() -> Result<(), viewstate_runtime::StateError> {
/// let scope = StateScope::new()?;
/// let form = StateContainer::new(&scope, Form { email: String::new(), submitting: false })?;
///
/// let mut submitting = form.observe_selected(getter(|f: &Form| f.submitting));
/// assert_eq!(submitting.next().await, Some(false));
///
/// form.mutate(|f| Form { email: "a@b.c".to_string(), ..f.clone() });
/// form.mutate(|f| Form { submitting: true, ..f.clone() });
///
/// // The email change does not touch `submitting`, so nothing is emitted for it
/// assert_eq!(submitting.next().await, Some(true));
/// # Ok(())
/// # }
/// ```
pub struct StateContainer<T> {
    shared: Arc<Shared<T>>,
    lane: mpsc::UnboundedSender<Job<T>>,
}

impl<T> StateContainer<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a container holding `initial`, with default configuration
    ///
    /// # Errors
    ///
    /// Returns [`StateError::ScopeCancelled`] if `scope` has already been torn down.
    pub fn new(scope: &StateScope, initial: T) -> Result<Self, StateError> {
        Self::build(scope, initial, ContainerConfig::default(), None)
    }

    /// Create a container with custom configuration
    ///
    /// This is the constructor that honours
    /// [`ContainerConfig::distinct_states`], hence the `PartialEq` bound.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::ScopeCancelled`] if `scope` has already been torn down.
    pub fn with_config(
        scope: &StateScope,
        initial: T,
        config: ContainerConfig,
    ) -> Result<Self, StateError>
    where
        T: PartialEq,
    {
        let distinct = config
            .distinct_states
            .then_some(<T as PartialEq>::eq as fn(&T, &T) -> bool);
        Self::build(scope, initial, config, distinct)
    }

    fn build(
        scope: &StateScope,
        initial: T,
        config: ContainerConfig,
        distinct: Option<fn(&T, &T) -> bool>,
    ) -> Result<Self, StateError> {
        let ContainerConfig {
            name, panic_policy, ..
        } = config;

        let shared = Arc::new(Shared {
            name,
            initial: initial.clone(),
            token: scope.token(),
            panic_policy,
            distinct,
            registry: Mutex::new(Registry {
                current: Arc::new(initial),
                subscribers: SmallVec::new(),
                closed: false,
            }),
        });

        let (lane, queue) = mpsc::unbounded_channel();
        let span = tracing::debug_span!("state_lane", container = %shared.name);
        let teardown: Arc<dyn Teardown> = Arc::clone(&shared) as Arc<dyn Teardown>;
        scope.attach(
            &shared.name,
            Arc::downgrade(&teardown),
            run_lane(Arc::clone(&shared), queue).instrument(span),
        )?;

        tracing::debug!(container = %shared.name, "Container created");
        Ok(Self { shared, lane })
    }

    /// The latest committed value
    ///
    /// Never waits for the lane: mutations scheduled but not yet applied are
    /// not reflected.
    #[must_use]
    pub fn current(&self) -> T {
        (*self.shared.snapshot()).clone()
    }

    /// The latest committed value, without cloning the state itself
    #[must_use]
    pub fn snapshot(&self) -> Arc<T> {
        self.shared.snapshot()
    }

    /// The value the container was created with
    #[must_use]
    pub fn initial(&self) -> &T {
        &self.shared.initial
    }

    /// The configured container name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Whether the container has been closed by teardown
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Number of live subscriptions to the primary stream
    ///
    /// Every derived view, joined or not, holds exactly one subscription.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut registry = self.shared.lock();
        registry.subscribers.retain(|subscriber| !subscriber.is_closed());
        registry.subscribers.len()
    }

    /// Schedule `update` against the latest committed value
    ///
    /// Returns immediately. The update runs later on the container's serial
    /// lane, after every mutation scheduled before it, and its result becomes
    /// the new current value. Mutations scheduled after teardown are dropped.
    pub fn mutate<F>(&self, update: F) -> MutationHandle
    where
        F: FnOnce(&T) -> T + Send + 'static,
    {
        let (done, applied) = oneshot::channel();
        if self.schedule(Job::Update {
            update: update::boxed(update),
            done,
        }) {
            ContainerMetrics::record_scheduled(&self.shared.name);
        } else {
            ContainerMetrics::record_abandoned(&self.shared.name, 1);
            tracing::warn!(container = %self.shared.name, "Mutation scheduled after teardown was dropped");
        }
        MutationHandle { applied }
    }

    /// Schedule a mutation back to the value the container was created with
    pub fn reset(&self) -> MutationHandle {
        let initial = self.shared.initial.clone();
        self.mutate(move |_| initial)
    }

    /// Wait until every mutation scheduled before this call has been handled
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Abandoned`] if the lane stopped first.
    pub async fn settled(&self) -> Result<(), StateError> {
        let (done, reached) = oneshot::channel();
        self.schedule(Job::Barrier(done));
        reached.await.map_err(|_| StateError::Abandoned)
    }

    fn schedule(&self, job: Job<T>) -> bool {
        !self.shared.token.is_cancelled() && self.lane.send(job).is_ok()
    }

    /// Observe every committed value
    ///
    /// The stream starts with the value current at subscription time, then
    /// yields each later commit once, in commit order. It ends after teardown.
    #[must_use]
    pub fn observe(&self) -> StateStream<T> {
        self.shared.subscribe()
    }

    /// Observe a projection of the state, skipping consecutive duplicates
    ///
    /// Seeded with `selector(current)` at subscription time. Afterwards a value
    /// is emitted only when the projection differs from the last emitted one.
    #[must_use]
    pub fn observe_selected<G>(&self, selector: G) -> Selected<T, G>
    where
        G: Getter<T>,
        G::Output: PartialEq + Clone,
    {
        Selected::new(self.observe(), selector)
    }

    /// Observe a join of 2 to 5 selectors as a stream of tuples
    ///
    /// Every selector is applied to each committed value from one
    /// subscription. The stream is seeded with the tuple for the value current
    /// at subscription time and afterwards emits whenever any position changes,
    /// in commit order. Dropping the stream drops its subscription.
    #[must_use]
    pub fn observe_joined<S>(&self, selection: S) -> Selected<T, Joined<S>>
    where
        S: Selection<T>,
    {
        self.observe_selected(Joined::new(selection))
    }

    /// Observe two selectors jointly. See [`StateContainer::observe_joined`].
    #[must_use]
    pub fn observe_selected2<G1, G2>(
        &self,
        g1: G1,
        g2: G2,
    ) -> Selected<T, Joined<(G1, G2)>>
    where
        (G1, G2): Selection<T>,
    {
        self.observe_joined((g1, g2))
    }

    /// Observe three selectors jointly. See [`StateContainer::observe_joined`].
    #[must_use]
    pub fn observe_selected3<G1, G2, G3>(
        &self,
        g1: G1,
        g2: G2,
        g3: G3,
    ) -> Selected<T, Joined<(G1, G2, G3)>>
    where
        (G1, G2, G3): Selection<T>,
    {
        self.observe_joined((g1, g2, g3))
    }

    /// Observe four selectors jointly. See [`StateContainer::observe_joined`].
    #[must_use]
    pub fn observe_selected4<G1, G2, G3, G4>(
        &self,
        g1: G1,
        g2: G2,
        g3: G3,
        g4: G4,
    ) -> Selected<T, Joined<(G1, G2, G3, G4)>>
    where
        (G1, G2, G3, G4): Selection<T>,
    {
        self.observe_joined((g1, g2, g3, g4))
    }

    /// Observe five selectors jointly. See [`StateContainer::observe_joined`].
    #[must_use]
    pub fn observe_selected5<G1, G2, G3, G4, G5>(
        &self,
        g1: G1,
        g2: G2,
        g3: G3,
        g4: G4,
        g5: G5,
    ) -> Selected<T, Joined<(G1, G2, G3, G4, G5)>>
    where
        (G1, G2, G3, G4, G5): Selection<T>,
    {
        self.observe_joined((g1, g2, g3, g4, g5))
    }
}

impl<T> Clone for StateContainer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            lane: self.lane.clone(),
        }
    }
}

impl<T> std::fmt::Debug for StateContainer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.shared.lock();
        f.debug_struct("StateContainer")
            .field("name", &self.shared.name)
            .field("closed", &registry.closed)
            .field("subscribers", &registry.subscribers.len())
            .finish_non_exhaustive()
    }
}
