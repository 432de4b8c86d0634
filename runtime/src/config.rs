//! Container configuration.
//!
//! Configuration is plain data with `const` builder methods and serde support,
//! so hosts can embed it in their own configuration files.
//!
//! # Example
//!
//! ```
//! use viewstate_runtime::{ContainerConfig, PanicPolicy};
//!
//! let config = ContainerConfig::default()
//!     .with_name("cart")
//!     .with_distinct_states(true)
//!     .with_panic_policy(PanicPolicy::Isolate);
//!
//! assert_eq!(config.name, "cart");
//! ```

use serde::{Deserialize, Serialize};

/// What the serial lane does when an update function panics
///
/// In both cases the panicking mutation is never committed, so the current
/// value is left exactly as it was.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanicPolicy {
    /// Let the panic escape into the lane's task
    ///
    /// The runtime reports it the way it reports any task panic, the lane
    /// terminates, later mutations are abandoned and
    /// [`StateScope::join`](crate::StateScope::join) returns
    /// [`StateError::LaneFailed`](crate::StateError::LaneFailed).
    #[default]
    Propagate,

    /// Catch the panic on the lane, log and count it, and keep serving
    /// subsequent mutations
    Isolate,
}

/// Configuration for a [`StateContainer`](crate::StateContainer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Label used in tracing spans, metrics and errors
    pub name: String,

    /// Suppress primary-stream emissions when a commit equals the current value
    ///
    /// Off by default: the primary stream emits every commit. Only honoured by
    /// [`StateContainer::with_config`](crate::StateContainer::with_config),
    /// which requires `T: PartialEq`.
    pub distinct_states: bool,

    /// Behavior when an update function panics
    pub panic_policy: PanicPolicy,
}

impl ContainerConfig {
    /// Create a configuration with custom values
    #[must_use]
    pub fn new(name: impl Into<String>, distinct_states: bool, panic_policy: PanicPolicy) -> Self {
        Self {
            name: name.into(),
            distinct_states,
            panic_policy,
        }
    }

    /// Set the container name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enable or disable full-state de-duplication of the primary stream
    #[must_use]
    pub const fn with_distinct_states(mut self, distinct_states: bool) -> Self {
        self.distinct_states = distinct_states;
        self
    }

    /// Set the panic policy
    #[must_use]
    pub const fn with_panic_policy(mut self, panic_policy: PanicPolicy) -> Self {
        self.panic_policy = panic_policy;
        self
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: "state".to_string(),
            distinct_states: false,
            panic_policy: PanicPolicy::default(),
        }
    }
}
