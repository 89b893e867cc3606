//! Error types for engine operations.

use std::fmt;
use std::path::PathBuf;

use anbar_support::rendering::{render_suggestions, shorten_type_name};

use crate::key::ServiceId;

/// Main error type for all engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Requested service (or key) has no matching registration.
    #[error("{}", .0)]
    NotRegistered(NotRegisteredError),

    /// A component is already registered under this key.
    #[error("component already registered under key {key:?}\n  Hint: keys must be unique within one engine")]
    AlreadyRegistered { key: String },

    /// The keyed component exists but does not expose the requested
    /// service type.
    #[error("component {key:?} does not expose service {service}")]
    ServiceNotExposed { key: String, service: ServiceId },

    /// A resolved instance could not be recovered as the requested type.
    #[error("resolved instance is not a {service}")]
    TypeMismatch { service: ServiceId },

    /// Unrecognized lifestyle text in a manifest or bulk registration.
    #[error("unrecognized lifestyle {value:?} (expected \"singleton\", \"transient\" or \"per_request\")")]
    InvalidLifestyle { value: String },

    /// The engine has been disposed and can no longer serve requests.
    #[error("engine has been disposed")]
    Disposed,

    /// A component factory failed.
    #[error("failed to construct component {key:?}: {source}")]
    ConstructionFailed {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An installation manifest could not be read.
    #[error("failed to read manifest {}: {}", .path.display(), .source)]
    ManifestIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An installation manifest could not be parsed.
    #[error("failed to parse manifest {}: {}", .path.display(), .source)]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl EngineError {
    /// Wraps a factory error as [`EngineError::ConstructionFailed`].
    pub fn construction(
        key: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        EngineError::ConstructionFailed {
            key: key.into(),
            source: Box::new(source),
        }
    }
}

/// Error when a service or key was not registered.
///
/// Carries "did you mean?" suggestions gathered from the registry.
#[derive(Debug)]
pub struct NotRegisteredError {
    /// The service type that was requested.
    pub requested: ServiceId,
    /// The lookup key, for keyed resolution.
    pub key: Option<String>,
    /// Registered keys and service names close to the request.
    pub suggestions: Vec<String>,
}

impl fmt::Display for NotRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key {
            Some(ref key) => write!(f, "no component registered under key {key:?}")?,
            None => write!(f, "service not registered: {}", self.requested)?,
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            write!(f, "{}", render_suggestions(&self.suggestions))?;
        }

        write!(
            f,
            "\n  Hint: register {} before resolving it",
            shorten_type_name(self.requested.type_name())
        )
    }
}

/// Convenient Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
