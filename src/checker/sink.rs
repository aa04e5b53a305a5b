//! Durable output for confirmed-registered accounts

use crate::checker::models::Account;
use crate::Result;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends confirmed accounts to the output file, one original line each.
/// A shared lock keeps concurrent flushes from interleaving partial writes.
pub struct ResultSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ResultSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// Create or truncate the output file. Called once at run start.
    pub async fn truncate(&self) -> Result<()> {
        tokio::fs::File::create(&self.path).await?;
        Ok(())
    }

    /// Append each account's original line and flush to disk before
    /// returning. Safe to call from concurrent tasks.
    pub async fn append(&self, accounts: &[Account]) -> Result<()> {
        if accounts.is_empty() {
            return Ok(());
        }

        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;

        let mut buf = String::new();
        for account in accounts {
            buf.push_str(account.line());
            buf.push('\n');
        }
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }
}
