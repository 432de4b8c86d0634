//! # Viewstate Core
//!
//! Core traits for the viewstate state container.
//!
//! This crate holds the pure, runtime-free vocabulary shared by the container
//! runtime and by application code:
//!
//! - **State**: An immutable, caller-defined value. Every transition produces a new one.
//! - **Effect**: A caller-defined value describing "what happened". Carries no behavior.
//! - **Transition**: Pure function `(State, Effect) → State` holding the business rules
//! - **Update**: Effect-free `State → State` function for direct mutation
//! - **Getter**: Pure projection `State → P` used to observe narrower slices of state
//!
//! ## Example
//!
//! ```
//! use viewstate_core::selector::{getter, Getter};
//! use viewstate_core::transition::Transition;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Pair {
//!     first: i32,
//!     second: i32,
//! }
//!
//! enum PairEffect {
//!     UpdateFirst(i32),
//!     UpdateSecond(i32),
//! }
//!
//! let transition = |state: &Pair, effect: PairEffect| match effect {
//!     PairEffect::UpdateFirst(first) => Pair { first, ..*state },
//!     PairEffect::UpdateSecond(second) => Pair { second, ..*state },
//! };
//!
//! let next = transition.apply(&Pair { first: 0, second: 1 }, PairEffect::UpdateFirst(2));
//! assert_eq!(next, Pair { first: 2, second: 1 });
//!
//! let first = getter(|state: &Pair| state.first);
//! assert_eq!(first.get(&next), 2);
//! ```

/// Selectors (getters) and their combinators
pub mod selector;

/// Transition module - pure `(State, Effect) → State` business logic
///
/// A transition is supplied once when a reducer is built and invoked once per
/// dispatched effect, always on the container's serial lane.
pub mod transition {
    /// A pure transition function from one state to the next
    ///
    /// Implemented for every `Fn(&S, E) -> S + Send + Sync`, so closures and
    /// plain functions can be used directly. Implement it by hand when the
    /// transition carries configuration.
    ///
    /// # Type Parameters
    ///
    /// - `S`: The state type
    /// - `E`: The effect type
    ///
    /// # Example
    ///
    /// ```
    /// use viewstate_core::transition::Transition;
    ///
    /// struct Clamp {
    ///     max: i64,
    /// }
    ///
    /// impl Transition<i64, i64> for Clamp {
    ///     fn apply(&self, state: &i64, delta: i64) -> i64 {
    ///         (state + delta).min(self.max)
    ///     }
    /// }
    ///
    /// assert_eq!(Clamp { max: 10 }.apply(&8, 5), 10);
    /// ```
    pub trait Transition<S, E>: Send + Sync {
        /// Compute the state that follows `state` once `effect` has happened
        ///
        /// Must be total and side-effect free. A panic here is a caller bug;
        /// the container never commits the result of a panicking transition.
        fn apply(&self, state: &S, effect: E) -> S;

        /// Left-fold a sequence of effects over `initial`, in order
        ///
        /// This is the value a container holds once every effect has been
        /// dispatched and applied.
        fn replay<I>(&self, initial: S, effects: I) -> S
        where
            I: IntoIterator<Item = E>,
            Self: Sized,
        {
            effects
                .into_iter()
                .fold(initial, |state, effect| self.apply(&state, effect))
        }
    }

    impl<S, E, F> Transition<S, E> for F
    where
        F: Fn(&S, E) -> S + Send + Sync,
    {
        fn apply(&self, state: &S, effect: E) -> S {
            self(state, effect)
        }
    }
}

/// Update module - effect-free state mutation
pub mod update {
    /// A boxed, one-shot update function `State → State`
    ///
    /// This is the unit of work scheduled onto a container's serial lane.
    pub type Update<S> = Box<dyn FnOnce(&S) -> S + Send>;

    /// Box an update closure
    #[must_use]
    pub fn boxed<S, F>(update: F) -> Update<S>
    where
        F: FnOnce(&S) -> S + Send + 'static,
    {
        Box::new(update)
    }
}

pub use selector::{Getter, getter};
pub use transition::Transition;
pub use update::Update;
