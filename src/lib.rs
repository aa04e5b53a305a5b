//! Regcheck - Email Registration Checker
//!
//! Checks a list of email:password credential lines against a remote
//! signup-validation endpoint, rotating requests through a pool of
//! HTTP/SOCKS proxies with per-proxy failure tracking and cooldowns.

pub mod checker;

pub use checker::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
