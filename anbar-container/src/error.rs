//! Error type for the container facade.
//!
//! The facade performs no recovery and no translation: engine failures
//! surface to the caller unchanged.

use anbar_engine::EngineError;

/// Main error type for container operations.
#[derive(Debug, thiserror::Error)]
pub enum AnbarError {
    /// A failure raised by the wrapped engine, propagated unchanged.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A manifest entry names a key with no cataloged descriptor.
    #[error("no cataloged component under key {key:?}\n  Hint: submit it with the component! macro before installing the manifest")]
    NotCataloged { key: String },

    /// Container-specific failure. Reserved; no current code path
    /// constructs this variant.
    #[error("container failure: {0}")]
    Container(String),
}

/// Convenient Result type for container operations.
pub type Result<T> = std::result::Result<T, AnbarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_displays_transparently() {
        let engine_err = EngineError::InvalidLifestyle {
            value: "pooled".to_string(),
        };
        let expected = format!("{engine_err}");

        let err: AnbarError = engine_err.into();
        assert_eq!(format!("{err}"), expected);
    }

    #[test]
    fn not_cataloged_names_the_key() {
        let err = AnbarError::NotCataloged {
            key: "mailer".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("\"mailer\""));
        assert!(msg.contains("component!"));
    }
}
