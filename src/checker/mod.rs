//! Registration checking engine
//!
//! This module provides functionality for:
//! - Tracking proxy health with failure counts and cooldowns
//! - Validating emails against the signup endpoint through rotating proxies
//! - Running per-account retry loops and batched concurrent checks
//! - Appending confirmed-registered accounts to durable output

pub mod account;
pub mod health;
pub mod models;
pub mod requester;
pub mod scheduler;
pub mod sink;

pub use account::AccountChecker;
pub use health::ProxyHealthTracker;
pub use models::{Account, CheckOutcome, ProxyEndpoint, ProxyKind};
pub use requester::{EmailValidator, HttpRequester, RequesterConfig};
pub use scheduler::{BatchScheduler, SchedulerConfig};
pub use sink::ResultSink;
