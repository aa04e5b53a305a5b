//! Per-account retry state machine
//!
//! Drives up to `max_retries` validation attempts for one account: pick a
//! proxy, fire the request, interpret the outcome, book the proxy's
//! success or failure, and either finish or go around again.

use crate::checker::health::ProxyHealthTracker;
use crate::checker::models::{Account, CheckOutcome, ProxyEndpoint};
use crate::checker::requester::EmailValidator;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default number of attempts per account
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default pause after a transport error in milliseconds, so a broken
/// proxy is not hammered in a tight loop
const DEFAULT_TRANSPORT_BACKOFF_MS: u64 = 1000;

/// Checks a single account against the validation endpoint, rotating
/// proxies between attempts. Cheap to clone; all heavy state is shared.
#[derive(Clone)]
pub struct AccountChecker {
    validator: Arc<dyn EmailValidator>,
    health: Arc<ProxyHealthTracker>,
    pool: Arc<Vec<ProxyEndpoint>>,
    max_retries: u32,
    transport_backoff: Duration,
}

impl AccountChecker {
    pub fn new(
        validator: Arc<dyn EmailValidator>,
        health: Arc<ProxyHealthTracker>,
        pool: Arc<Vec<ProxyEndpoint>>,
    ) -> Self {
        Self {
            validator,
            health,
            pool,
            max_retries: DEFAULT_MAX_RETRIES,
            transport_backoff: Duration::from_millis(DEFAULT_TRANSPORT_BACKOFF_MS),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_transport_backoff(mut self, backoff: Duration) -> Self {
        self.transport_backoff = backoff;
        self
    }

    /// Run the retry loop for one account. Returns the account only when
    /// the endpoint confirms it registered; every other path (confirmed
    /// negative, unknown status, retry exhaustion) yields `None`.
    pub async fn check(&self, account: &Account) -> Option<Account> {
        // Proxies already tried for this account; selection prefers others
        let mut used: HashSet<String> = HashSet::new();

        for attempt in 1..=self.max_retries {
            let proxy = self.health.select(&self.pool, &used);
            if let Some(ref proxy) = proxy {
                used.insert(proxy.uri().to_string());
            }

            let outcome = self.validator.validate(account.email(), proxy.as_ref()).await;

            match outcome {
                CheckOutcome::Registered => {
                    if let Some(ref proxy) = proxy {
                        self.health.record_success(proxy);
                    }
                    info!(email = %account.email(), "registered");
                    return Some(account.clone());
                }
                CheckOutcome::NotRegistered => {
                    // Confirmed negative is final, no point retrying
                    if let Some(ref proxy) = proxy {
                        self.health.record_success(proxy);
                    }
                    info!(email = %account.email(), "not registered");
                    return None;
                }
                CheckOutcome::Unknown(status) => {
                    // The proxy itself worked; retry with a different one
                    if let Some(ref proxy) = proxy {
                        self.health.record_success(proxy);
                    }
                    warn!(email = %account.email(), ?status, attempt, "unknown status");
                }
                CheckOutcome::RateLimited(message) => {
                    if let Some(ref proxy) = proxy {
                        self.health.record_failure(proxy);
                    }
                    warn!(
                        email = %account.email(),
                        message = message.as_deref().unwrap_or("too many attempts"),
                        attempt,
                        "rate limited"
                    );
                }
                CheckOutcome::HttpError(code) => {
                    if let Some(ref proxy) = proxy {
                        self.health.record_failure(proxy);
                    }
                    warn!(email = %account.email(), code, attempt, "http error");
                }
                CheckOutcome::TransportError(cause) => {
                    if let Some(ref proxy) = proxy {
                        self.health.record_failure(proxy);
                    }
                    warn!(email = %account.email(), %cause, attempt, "transport error");
                    tokio::time::sleep(self.transport_backoff).await;
                }
            }
        }

        debug!(email = %account.email(), "gave up after {} attempts", self.max_retries);
        None
    }
}
