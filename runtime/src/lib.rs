//! # Viewstate Runtime
//!
//! Runtime implementation for the viewstate state container.
//!
//! This crate provides the container that owns a piece of immutable state,
//! serializes every mutation onto a single lane, and exposes the committed
//! values as observable streams.
//!
//! ## Core Components
//!
//! - **`StateScope`**: The owning scope. Spawns lanes and tears them down exactly once.
//! - **`StateContainer`**: Holds the current value, a FIFO mutation lane and its observers
//! - **`Reducer`**: Funnels effects through a pure transition into a container
//! - **Observables**: `StateStream` (every commit), `Selected` (de-duplicated
//!   projection), including joins of 2 to 5 selectors over one subscription
//!
//! ## Control Flow
//!
//! ```text
//! dispatch(effect) ─▶ lane (FIFO) ─▶ transition(current, effect) ─▶ commit
//!                                                                   │
//!                        observe() ◀── every committed value ◀──────┤
//!          observe_selected(s) ◀── s(value), duplicates dropped ◀───┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use viewstate_runtime::{create_reducer, StateScope};
//!
//! # async fn example() -> Result<(), viewstate_runtime::StateError> {
//! let scope = StateScope::new()?;
//! let counter = create_reducer(&scope, 0_i64, |count: &i64, delta: i64| count + delta)?;
//!
//! let mut updates = counter.container().observe();
//! counter.dispatch(1);
//! counter.dispatch(2);
//!
//! assert_eq!(updates.next().await, Some(0));
//! assert_eq!(updates.next().await, Some(1));
//! assert_eq!(updates.next().await, Some(3));
//!
//! scope.cancel();
//! # Ok(())
//! # }
//! ```

/// Container configuration
pub mod config;

/// The state container and its serial mutation lane
pub mod container;

/// Metrics describing lane and observer activity
pub mod metrics;

/// Stream operators: primary stream, de-duplicated selections, combine-latest
pub mod observable;

/// Reducer: effects through a transition function into a container
pub mod reducer;

/// Joins of 2 to 5 selectors
pub mod selection;

/// Owning scope that spawns lanes and tears them down
pub mod scope;

/// Error types for the state runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur when building or driving a state container
    ///
    /// Scheduling itself never fails: `mutate` and `dispatch` always return a
    /// handle. These errors surface from construction, from waiting on a
    /// handle, and from joining a torn-down scope.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StateError {
        /// No tokio runtime was available to own the container's lane
        ///
        /// Containers and reducers must be created from inside a runtime
        /// (or from a scope built with an explicit handle).
        #[error("No async runtime available: state containers must be created inside a tokio runtime")]
        NoRuntime,

        /// The owning scope was already torn down
        #[error("Owning scope has been cancelled")]
        ScopeCancelled,

        /// A mutation was never committed
        ///
        /// Either the owning scope was torn down before the lane reached it,
        /// or its update function panicked.
        #[error("Mutation abandoned before it was applied")]
        Abandoned,

        /// A serial lane terminated because an update function panicked
        ///
        /// Only produced under [`PanicPolicy::Propagate`](crate::config::PanicPolicy::Propagate).
        #[error("Serial lane for container '{container}' terminated after a panicking update")]
        LaneFailed {
            /// Name of the container whose lane failed
            container: String,
        },
    }
}

pub use config::{ContainerConfig, PanicPolicy};
pub use container::{MutationHandle, StateContainer};
pub use error::StateError;
pub use observable::{Selected, StateStream};
pub use reducer::Reducer;
pub use scope::StateScope;
pub use selection::{Joined, Selection};

// Re-export the pure vocabulary so most callers only need this crate
pub use viewstate_core::{Getter, Transition, Update, getter};

/// Create a container holding `initial`, owned by `scope`
///
/// # Errors
///
/// Returns [`StateError::ScopeCancelled`] if `scope` has already been torn down.
pub fn create_container<T>(scope: &StateScope, initial: T) -> Result<StateContainer<T>, StateError>
where
    T: Clone + Send + Sync + 'static,
{
    StateContainer::new(scope, initial)
}

/// Create a reducer over a fresh container holding `initial`
///
/// # Errors
///
/// Returns [`StateError::ScopeCancelled`] if `scope` has already been torn down.
pub fn create_reducer<T, E, R>(
    scope: &StateScope,
    initial: T,
    transition: R,
) -> Result<Reducer<T, E>, StateError>
where
    T: Clone + Send + Sync + 'static,
    E: Send + 'static,
    R: Transition<T, E> + 'static,
{
    Ok(Reducer::new(StateContainer::new(scope, initial)?, transition))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_create_container() {
        let scope = StateScope::new().unwrap();
        let container = create_container(&scope, "hello".to_string()).unwrap();

        assert_eq!(container.current(), "hello");
    }

    #[tokio::test]
    async fn test_create_reducer() {
        let scope = StateScope::new().unwrap();
        let reducer = create_reducer(&scope, 0_i64, |count: &i64, delta: i64| count + delta).unwrap();
        let mut updates = reducer.container().observe();

        reducer.dispatch(1);
        reducer.dispatch(2);

        assert_eq!(updates.next().await, Some(0));
        assert_eq!(updates.next().await, Some(1));
        assert_eq!(updates.next().await, Some(3));
    }

    #[tokio::test]
    async fn test_create_on_cancelled_scope() {
        let scope = StateScope::new().unwrap();
        scope.cancel();

        let result = create_container(&scope, 1_u8);
        assert_eq!(result.err(), Some(StateError::ScopeCancelled));
    }

    #[test]
    fn test_create_outside_runtime() {
        assert_eq!(StateScope::new().err(), Some(StateError::NoRuntime));
    }

    #[test]
    fn test_error_messages() {
        let error = StateError::LaneFailed {
            container: "cart".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Serial lane for container 'cart' terminated after a panicking update"
        );
    }
}
