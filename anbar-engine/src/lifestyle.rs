//! Component lifestyles.
//!
//! A lifestyle governs how many living instances of a registered component
//! exist:
//! - [`Lifestyle::Singleton`] — one shared instance for the whole engine
//! - [`Lifestyle::Transient`] — a fresh instance on every resolve
//! - [`Lifestyle::PerRequest`] — one instance per request span

use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Defines the lifetime of a component's instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifestyle {
    /// One instance shared for the lifetime of the engine.
    ///
    /// Created on first resolve, never evicted by `release`.
    #[default]
    Singleton,

    /// New instance created on every resolve call.
    ///
    /// Each instance enters the live-instance tracker until released.
    Transient,

    /// One instance per request span.
    ///
    /// Cached on first resolve, evicted when that instance is released,
    /// rebuilt on the next resolve.
    PerRequest,
}

impl Lifestyle {
    /// Returns `true` for the shared lifestyle.
    #[inline]
    pub fn is_singleton(&self) -> bool {
        matches!(self, Lifestyle::Singleton)
    }

    /// Returns `true` for the fresh-per-resolve lifestyle.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Lifestyle::Transient)
    }

    /// Returns `true` for the per-request lifestyle.
    #[inline]
    pub fn is_per_request(&self) -> bool {
        matches!(self, Lifestyle::PerRequest)
    }

    /// Lifestyle name as used in installation manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifestyle::Singleton => "singleton",
            Lifestyle::Transient => "transient",
            Lifestyle::PerRequest => "per_request",
        }
    }
}

impl fmt::Display for Lifestyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Lifestyle {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "singleton" => Ok(Lifestyle::Singleton),
            "transient" => Ok(Lifestyle::Transient),
            "per_request" | "per-request" => Ok(Lifestyle::PerRequest),
            _ => Err(EngineError::InvalidLifestyle {
                value: s.to_string(),
            }),
        }
    }
}
