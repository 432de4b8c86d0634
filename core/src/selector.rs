//! Selectors: pure projections from a state snapshot to a narrower value.
//!
//! A [`Getter`] extracts a projection `P` from a state `T`. Containers use
//! getters to derive observables that only emit when the projection changes.
//!
//! Getters compose like read-only lenses:
//!
//! ```
//! use viewstate_core::selector::{getter, Getter};
//!
//! struct Profile {
//!     name: String,
//! }
//!
//! struct Session {
//!     profile: Profile,
//! }
//!
//! let profile = getter(|session: &Session| Profile { name: session.profile.name.clone() });
//! let name_len = profile
//!     .then(getter(|profile: &Profile| profile.name.clone()))
//!     .map(|name| name.len());
//!
//! let session = Session { profile: Profile { name: "ada".to_string() } };
//! assert_eq!(name_len.get(&session), 3);
//! ```

/// A pure, total projection from `T` to [`Getter::Output`]
///
/// Implemented for every `Fn(&T) -> P`. The projection type is an associated
/// type so tuples of getters can be joined without extra type parameters.
pub trait Getter<T> {
    /// The projected value
    type Output;

    /// Project `state`
    fn get(&self, state: &T) -> Self::Output;

    /// Compose with a getter over this getter's output
    ///
    /// `a.then(b)` projects `T → A::Output → B::Output`.
    #[must_use]
    fn then<G>(self, next: G) -> Then<Self, G>
    where
        Self: Sized,
        G: Getter<Self::Output>,
    {
        Then { first: self, next }
    }

    /// Transform the projected value
    #[must_use]
    fn map<F, Q>(self, f: F) -> Map<Self, F>
    where
        Self: Sized,
        F: Fn(Self::Output) -> Q,
    {
        Map { inner: self, f }
    }
}

impl<T, P, F> Getter<T> for F
where
    F: Fn(&T) -> P,
{
    type Output = P;

    fn get(&self, state: &T) -> P {
        self(state)
    }
}

/// Pin a closure's argument type so it can be used as a [`Getter`]
///
/// Closure parameters are not inferred through trait bounds, so
/// `getter(|s: &State| s.field)` is the idiomatic way to build one inline.
#[must_use]
pub const fn getter<T, P, F>(f: F) -> F
where
    F: Fn(&T) -> P,
{
    f
}

/// Two getters applied one after another. See [`Getter::then`].
#[derive(Debug, Clone, Copy)]
pub struct Then<A, B> {
    first: A,
    next: B,
}

impl<T, A, B> Getter<T> for Then<A, B>
where
    A: Getter<T>,
    B: Getter<A::Output>,
{
    type Output = B::Output;

    fn get(&self, state: &T) -> Self::Output {
        self.next.get(&self.first.get(state))
    }
}

/// A getter whose output is transformed by a function. See [`Getter::map`].
#[derive(Debug, Clone, Copy)]
pub struct Map<G, F> {
    inner: G,
    f: F,
}

impl<T, G, F, Q> Getter<T> for Map<G, F>
where
    G: Getter<T>,
    F: Fn(G::Output) -> Q,
{
    type Output = Q;

    fn get(&self, state: &T) -> Q {
        (self.f)(self.inner.get(state))
    }
}
