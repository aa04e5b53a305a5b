//! Batch scheduler: fan-out per batch, strictly sequential batches
//!
//! Partitions the account list into fixed-size batches, runs every check in
//! a batch concurrently, flushes the batch's confirmed subset, reports
//! progress and pauses before the next batch. Peak concurrency is capped at
//! one batch's width.

use crate::checker::account::AccountChecker;
use crate::checker::health::ProxyHealthTracker;
use crate::checker::models::{Account, ProxyEndpoint};
use crate::checker::sink::ResultSink;
use crate::Result;
use futures::future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default number of accounts checked concurrently per batch
const DEFAULT_BATCH_SIZE: usize = 50;

/// Default pause between batches in seconds
const DEFAULT_BATCH_DELAY_SECS: u64 = 1;

/// Configuration for the batch scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Accounts per batch; also the concurrency cap
    pub batch_size: usize,
    /// Pause between batches (skipped after the last)
    pub inter_batch_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            inter_batch_delay: Duration::from_secs(DEFAULT_BATCH_DELAY_SECS),
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_inter_batch_delay(mut self, delay: Duration) -> Self {
        self.inter_batch_delay = delay;
        self
    }
}

/// Runs the whole account list through batched concurrent checks
pub struct BatchScheduler {
    checker: AccountChecker,
    sink: ResultSink,
    health: Arc<ProxyHealthTracker>,
    pool: Arc<Vec<ProxyEndpoint>>,
    config: SchedulerConfig,
}

impl BatchScheduler {
    pub fn new(
        checker: AccountChecker,
        sink: ResultSink,
        health: Arc<ProxyHealthTracker>,
        pool: Arc<Vec<ProxyEndpoint>>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            checker,
            sink,
            health,
            pool,
            config,
        }
    }

    /// Check every account once, batch by batch, appending each batch's
    /// confirmed-registered subset to the sink before the next batch
    /// starts. Returns all confirmed accounts in input order.
    pub async fn run(&self, accounts: &[Account]) -> Result<Vec<Account>> {
        let mut registered: Vec<Account> = Vec::new();
        let mut processed = 0usize;
        let batch_count = accounts.chunks(self.config.batch_size).count();

        for (index, batch) in accounts.chunks(self.config.batch_size).enumerate() {
            // Fan-out/fan-in: join_all keeps results in batch input order
            let checks = batch.iter().map(|account| self.checker.check(account));
            let results = future::join_all(checks).await;
            let confirmed: Vec<Account> = results.into_iter().flatten().collect();

            if !confirmed.is_empty() {
                self.sink.append(&confirmed).await?;
            }
            registered.extend(confirmed);
            processed += batch.len();

            info!(
                processed,
                total = accounts.len(),
                registered = registered.len(),
                eligible_proxies = self.health.eligible_count(&self.pool),
                pool_size = self.pool.len(),
                "batch complete"
            );

            let last = index + 1 == batch_count;
            if !last && !self.config.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.config.inter_batch_delay).await;
            }
        }

        Ok(registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::models::CheckOutcome;
    use crate::checker::requester::EmailValidator;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Validator mapping each email to a fixed outcome, counting calls
    struct TableValidator {
        outcomes: HashMap<String, CheckOutcome>,
        calls: Mutex<Vec<String>>,
    }

    impl TableValidator {
        fn new(entries: &[(&str, CheckOutcome)]) -> Self {
            Self {
                outcomes: entries
                    .iter()
                    .map(|(email, outcome)| (email.to_string(), outcome.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EmailValidator for TableValidator {
        async fn validate(&self, email: &str, _proxy: Option<&ProxyEndpoint>) -> CheckOutcome {
            self.calls.lock().unwrap().push(email.to_string());
            self.outcomes
                .get(email)
                .cloned()
                .unwrap_or(CheckOutcome::Unknown(None))
        }
    }

    fn scheduler_with(
        validator: Arc<TableValidator>,
        sink_path: &std::path::Path,
        config: SchedulerConfig,
    ) -> BatchScheduler {
        let health = Arc::new(ProxyHealthTracker::new());
        let pool: Arc<Vec<ProxyEndpoint>> = Arc::new(Vec::new());
        let checker = AccountChecker::new(validator, health.clone(), pool.clone());
        BatchScheduler::new(checker, ResultSink::new(sink_path), health, pool, config)
    }

    #[tokio::test]
    async fn test_every_account_checked_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let validator = Arc::new(TableValidator::new(&[
            ("a@x.com", CheckOutcome::NotRegistered),
            ("b@x.com", CheckOutcome::NotRegistered),
            ("c@x.com", CheckOutcome::NotRegistered),
            ("d@x.com", CheckOutcome::NotRegistered),
            ("e@x.com", CheckOutcome::NotRegistered),
        ]));
        let config = SchedulerConfig::new()
            .with_batch_size(2)
            .with_inter_batch_delay(Duration::from_millis(0));
        let scheduler = scheduler_with(validator.clone(), &path, config);

        let accounts = Account::parse_list("a@x.com:1\nb@x.com:2\nc@x.com:3\nd@x.com:4\ne@x.com:5");
        let registered = scheduler.run(&accounts).await.unwrap();
        assert!(registered.is_empty());

        let mut calls = validator.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, vec!["a@x.com", "b@x.com", "c@x.com", "d@x.com", "e@x.com"]);
    }

    #[tokio::test]
    async fn test_output_is_union_of_batches_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let validator = Arc::new(TableValidator::new(&[
            ("a@x.com", CheckOutcome::Registered),
            ("b@x.com", CheckOutcome::NotRegistered),
            ("c@x.com", CheckOutcome::Registered),
            ("d@x.com", CheckOutcome::Registered),
        ]));
        let config = SchedulerConfig::new()
            .with_batch_size(2)
            .with_inter_batch_delay(Duration::from_millis(0));
        let scheduler = scheduler_with(validator, &path, config);

        let accounts = Account::parse_list("a@x.com:1\nb@x.com:2\nc@x.com:3\nd@x.com:4");
        let registered = scheduler.run(&accounts).await.unwrap();

        let lines: Vec<&str> = registered.iter().map(Account::line).collect();
        assert_eq!(lines, vec!["a@x.com:1", "c@x.com:3", "d@x.com:4"]);

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "a@x.com:1\nc@x.com:3\nd@x.com:4\n");
    }

    #[tokio::test]
    async fn test_stable_partitioning_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let validator_outcomes: Vec<(&str, CheckOutcome)> = vec![
            ("a@x.com", CheckOutcome::Registered),
            ("b@x.com", CheckOutcome::NotRegistered),
            ("c@x.com", CheckOutcome::Registered),
        ];
        let accounts = Account::parse_list("a@x.com:1\nb@x.com:2\nc@x.com:3");

        let mut outputs = Vec::new();
        for run in 0..2 {
            let path = dir.path().join(format!("out{run}.txt"));
            let validator = Arc::new(TableValidator::new(&validator_outcomes));
            let config = SchedulerConfig::new()
                .with_batch_size(2)
                .with_inter_batch_delay(Duration::from_millis(0));
            let scheduler = scheduler_with(validator, &path, config);
            scheduler.run(&accounts).await.unwrap();
            outputs.push(tokio::fs::read_to_string(&path).await.unwrap());
        }
        assert_eq!(outputs[0], outputs[1]);
    }

    #[tokio::test]
    async fn test_failures_never_abort_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let validator = Arc::new(TableValidator::new(&[
            ("a@x.com", CheckOutcome::TransportError("refused".to_string())),
            ("b@x.com", CheckOutcome::Registered),
        ]));
        let config = SchedulerConfig::new()
            .with_batch_size(1)
            .with_inter_batch_delay(Duration::from_millis(0));
        let health = Arc::new(ProxyHealthTracker::new());
        let pool: Arc<Vec<ProxyEndpoint>> = Arc::new(Vec::new());
        let checker = AccountChecker::new(validator, health.clone(), pool.clone())
            .with_transport_backoff(Duration::from_millis(1));
        let scheduler =
            BatchScheduler::new(checker, ResultSink::new(&path), health, pool, config);

        let accounts = Account::parse_list("a@x.com:1\nb@x.com:2");
        let registered = scheduler.run(&accounts).await.unwrap();

        let lines: Vec<&str> = registered.iter().map(Account::line).collect();
        assert_eq!(lines, vec!["b@x.com:2"]);
    }
}
