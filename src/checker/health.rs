//! Proxy health tracking: per-proxy failure counts and cooldowns
//!
//! This module provides the shared health store used by all concurrently
//! running account checks. Selection follows an ordered fallback policy:
//! eligible proxies not yet used for the account, then any eligible proxy,
//! then an emergency de-embargo that clears every cooldown so a run can
//! always make forward progress.

use crate::checker::models::ProxyEndpoint;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// Default number of failures before a proxy is considered dead
const DEFAULT_MAX_FAILURES: u32 = 3;

/// Default cooldown after a failure in seconds
const DEFAULT_COOLDOWN_SECS: u64 = 60;

/// Mutable health state for one proxy
#[derive(Debug, Default, Clone)]
struct ProxyHealth {
    failures: u32,
    cooldown_until: Option<Instant>,
}

impl ProxyHealth {
    fn eligible(&self, max_failures: u32, now: Instant) -> bool {
        self.failures < max_failures && self.cooldown_until.map_or(true, |until| now >= until)
    }
}

/// Tracks failure counts and cooldown expiry per proxy URI.
///
/// The map is guarded by a single mutex; the lock is never held across an
/// await point. Checkers racing on the same proxy's state is tolerated,
/// the accounting is best-effort.
pub struct ProxyHealthTracker {
    states: Mutex<HashMap<String, ProxyHealth>>,
    max_failures: u32,
    cooldown: Duration,
}

impl ProxyHealthTracker {
    /// Create a tracker with default limits (3 failures, 60s cooldown)
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            max_failures: DEFAULT_MAX_FAILURES,
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
        }
    }

    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Record a failed request through `proxy`: bump its failure count and
    /// restart its cooldown window (absolute, not cumulative)
    pub fn record_failure(&self, proxy: &ProxyEndpoint) {
        let mut states = self.lock_states();
        let state = states.entry(proxy.uri().to_string()).or_default();
        state.failures += 1;
        state.cooldown_until = Some(Instant::now() + self.cooldown);
        if state.failures == self.max_failures {
            warn!(proxy = %proxy, failures = state.failures, "proxy marked dead");
        }
    }

    /// Record a successful request through `proxy`: reset its failure count
    /// and clear any cooldown. Idempotent.
    pub fn record_success(&self, proxy: &ProxyEndpoint) {
        let mut states = self.lock_states();
        let state = states.entry(proxy.uri().to_string()).or_default();
        state.failures = 0;
        state.cooldown_until = None;
    }

    /// Pick one proxy from `pool` uniformly at random, preferring eligible
    /// proxies outside `excluding`, then any eligible proxy. If every proxy
    /// is ineligible, all cooldowns are cleared (failure counts stay) and
    /// the pick falls back to the full pool. Returns `None` only for an
    /// empty pool, which means: make the request unproxied.
    pub fn select(
        &self,
        pool: &[ProxyEndpoint],
        excluding: &HashSet<String>,
    ) -> Option<ProxyEndpoint> {
        if pool.is_empty() {
            return None;
        }

        let mut states = self.lock_states();
        let now = Instant::now();
        let mut rng = rand::thread_rng();

        let eligible: Vec<&ProxyEndpoint> = pool
            .iter()
            .filter(|p| Self::eligible_in(&states, p, self.max_failures, now))
            .collect();

        let fresh: Vec<&ProxyEndpoint> = eligible
            .iter()
            .copied()
            .filter(|p| !excluding.contains(p.uri()))
            .collect();

        if let Some(proxy) = fresh.choose(&mut rng) {
            return Some((*proxy).clone());
        }
        if let Some(proxy) = eligible.choose(&mut rng) {
            return Some((*proxy).clone());
        }

        // Emergency de-embargo: every proxy is cooling down or dead. Clear
        // the cooldowns so the run keeps moving instead of stalling.
        warn!("no eligible proxy left; clearing all cooldowns");
        for state in states.values_mut() {
            state.cooldown_until = None;
        }
        pool.choose(&mut rng).cloned()
    }

    /// Number of proxies in `pool` currently eligible for selection
    pub fn eligible_count(&self, pool: &[ProxyEndpoint]) -> usize {
        let states = self.lock_states();
        let now = Instant::now();
        pool.iter()
            .filter(|p| Self::eligible_in(&states, p, self.max_failures, now))
            .count()
    }

    /// Number of proxies in `pool` at or past the failure threshold
    pub fn dead_count(&self, pool: &[ProxyEndpoint]) -> usize {
        let states = self.lock_states();
        pool.iter()
            .filter(|p| {
                states
                    .get(p.uri())
                    .map_or(false, |s| s.failures >= self.max_failures)
            })
            .count()
    }

    /// Current failure count for `proxy`
    pub fn failures(&self, proxy: &ProxyEndpoint) -> u32 {
        self.lock_states()
            .get(proxy.uri())
            .map_or(0, |s| s.failures)
    }

    fn eligible_in(
        states: &HashMap<String, ProxyHealth>,
        proxy: &ProxyEndpoint,
        max_failures: u32,
        now: Instant,
    ) -> bool {
        states
            .get(proxy.uri())
            .map_or(true, |s| s.eligible(max_failures, now))
    }

    fn lock_states(&self) -> std::sync::MutexGuard<'_, HashMap<String, ProxyHealth>> {
        self.states.lock().expect("proxy health lock poisoned")
    }
}

impl Default for ProxyHealthTracker {
    fn default() -> Self {
        Self::new()
    }
}
