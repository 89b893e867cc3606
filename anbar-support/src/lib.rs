//! # Anbar Support
//!
//! Shared utilities for the Anbar facade crates.
//!
//! This crate provides:
//! - Text rendering for error messages
//! - Type-name shortening and "did you mean?" suggestions

pub mod rendering;
