//! Error types for the container and the hosting layer.

use thiserror::Error;

/// Dependency injection errors
///
/// Raised while resolving components from a [`ServiceProvider`](crate::ServiceProvider)
/// or one of its [`Scope`](crate::Scope)s.
///
/// # Examples
///
/// ```rust
/// use ferrous_host::DiError;
///
/// let circular = DiError::Circular(vec!["Repo", "Cache", "Repo"]);
/// assert_eq!(circular.to_string(), "Circular dependency: Repo -> Cache -> Repo");
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Service not registered
    #[error("Service not found: {0}")]
    NotFound(&'static str),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// Invalid lifetime resolution (e.g., scoped from root)
    #[error("Lifetime error: {0}")]
    WrongLifetime(&'static str),
    /// Maximum recursion depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// The scope was disposed and can no longer resolve anything
    #[error("Scope {0} has been disposed")]
    ScopeDisposed(u64),
    /// A factory asked for a parameter that the caller did not supply
    #[error("Missing parameter of type: {0}")]
    MissingParameter(&'static str),
}

/// Result type for DI operations
pub type DiResult<T> = Result<T, DiError>;

/// Errors raised by the hosting layer.
///
/// Configuration errors (`NoRegistration`, `AmbiguousRegistration`,
/// `UnknownInstanceMode`, `InvalidBehaviorMetadata`, `Config`) surface from
/// [`ServiceHost::open`](crate::host::ServiceHost::open) before any call is
/// served. `Consistency` means the host drove a lifecycle transition this
/// crate never performs and must not be ignored.
#[derive(Debug, Error)]
pub enum HostError {
    /// No registration implements the contract
    #[error("no registration implements contract `{contract}`")]
    NoRegistration {
        /// Contract type name
        contract: &'static str,
    },

    /// More than one registration implements the contract
    #[error("contract `{contract}` is implemented by {count} registrations")]
    AmbiguousRegistration {
        /// Contract type name
        contract: &'static str,
        /// Number of matching registrations
        count: usize,
    },

    /// An instance context mode name that is not Single, PerSession or PerCall
    #[error("unknown instance context mode `{0}`")]
    UnknownInstanceMode(String),

    /// The `behavior` metadata entry holds something other than a `ServiceBehavior`
    #[error("metadata `behavior` on `{component}` is not a ServiceBehavior")]
    InvalidBehaviorMetadata {
        /// Component type name
        component: &'static str,
    },

    /// Internal lifecycle invariant violated
    #[error("consistency error: {0}")]
    Consistency(&'static str),

    /// Component resolution failed
    #[error("resolution failed: {0}")]
    Resolution(#[from] DiError),

    /// Host options could not be loaded
    #[error("configuration error: {message}")]
    Config {
        /// What was wrong
        message: String,
    },
}

impl HostError {
    /// True for errors that abort host startup.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            HostError::NoRegistration { .. }
                | HostError::AmbiguousRegistration { .. }
                | HostError::UnknownInstanceMode(_)
                | HostError::InvalidBehaviorMetadata { .. }
                | HostError::Config { .. }
        )
    }
}

/// Result type for hosting operations
pub type HostResult<T> = Result<T, HostError>;
