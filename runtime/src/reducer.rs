//! Reducer: effects funnelled through a pure transition into a container.
//!
//! A [`Reducer`] pairs a [`StateContainer`] with a [`Transition`]. Dispatching
//! an effect schedules `transition.apply(current, effect)` onto the
//! container's serial lane, so dispatched effects share the lane, and its
//! ordering, with direct mutations of the same container.
//!
//! State is read through the container, never through the reducer.

use crate::container::{MutationHandle, StateContainer};
use crate::error::StateError;
use crate::scope::StateScope;
use std::sync::Arc;
use viewstate_core::Transition;

/// Funnels effects of type `E` into a container of `T`
///
/// Cloning yields another reducer over the same container and transition.
///
/// # Example
///
/// ```no_run
/// use viewstate_runtime::{Reducer, StateScope};
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum Light {
///     Off,
///     On,
/// }
///
/// enum Switch {
///     Toggle,
///     Off,
/// }
///
/// fn transition(light: &Light, effect: Switch) -> Light {
///     match (light, effect) {
///         (Light::Off, Switch::Toggle) => Light::On,
///         _ => Light::Off,
///     }
/// }
///
/// # async fn example() -> Result<(), viewstate_runtime::StateError> {
/// let scope = StateScope::new()?;
/// let light = Reducer::create(&scope, Light::Off, transition)?;
///
/// light.dispatch(Switch::Toggle).applied().await?;
/// assert_eq!(light.container().current(), Light::On);
///
/// light.dispatch(Switch::Off);
/// # Ok(())
/// # }
/// ```
pub struct Reducer<T, E> {
    container: StateContainer<T>,
    transition: Arc<dyn Transition<T, E>>,
}

impl<T, E> Reducer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    /// Wrap an existing container
    ///
    /// Other handles to `container` can keep mutating it directly; those
    /// mutations interleave with dispatched effects in scheduling order.
    pub fn new<R>(container: StateContainer<T>, transition: R) -> Self
    where
        R: Transition<T, E> + 'static,
    {
        Self {
            container,
            transition: Arc::new(transition),
        }
    }

    /// Build a reducer over a fresh container holding `initial`
    ///
    /// # Errors
    ///
    /// Returns [`StateError::ScopeCancelled`] if `scope` has already been torn down.
    pub fn create<R>(scope: &StateScope, initial: T, transition: R) -> Result<Self, StateError>
    where
        R: Transition<T, E> + 'static,
    {
        Ok(Self::new(StateContainer::new(scope, initial)?, transition))
    }

    /// Schedule `effect` through the transition
    ///
    /// Returns immediately. Effects are applied in dispatch order, one at a
    /// time, each against the state left by everything scheduled before it.
    pub fn dispatch(&self, effect: E) -> MutationHandle {
        let transition = Arc::clone(&self.transition);
        self.container
            .mutate(move |state| transition.apply(state, effect))
    }

    /// Schedule an effect-free update on the same lane as dispatched effects
    pub fn update<F>(&self, update: F) -> MutationHandle
    where
        F: FnOnce(&T) -> T + Send + 'static,
    {
        self.container.mutate(update)
    }

    /// The container this reducer writes to
    #[must_use]
    pub const fn container(&self) -> &StateContainer<T> {
        &self.container
    }

    /// Give up the transition and keep the container
    #[must_use]
    pub fn into_container(self) -> StateContainer<T> {
        self.container
    }
}

impl<T, E> AsRef<StateContainer<T>> for Reducer<T, E> {
    fn as_ref(&self) -> &StateContainer<T> {
        &self.container
    }
}

impl<T, E> Clone for Reducer<T, E> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            transition: Arc::clone(&self.transition),
        }
    }
}

impl<T, E> std::fmt::Debug for Reducer<T, E>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reducer")
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}
