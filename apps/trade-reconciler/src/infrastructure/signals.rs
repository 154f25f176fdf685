//! Directory inbox for entry signals.
//!
//! The external signal layer drops one JSON file per signal into the inbox.
//! Each drain reads the files in name order; a file is deleted only once its
//! signal is decided. A signal that could not be decided is renamed to
//! `*.failed`, and a file that does not parse to `*.rejected`, so neither is
//! read again.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::application::ports::{
    EntrySignal, ReceivedSignal, SignalDisposition, SignalSourceError, SignalSourcePort,
};

/// Signal source backed by a directory of `*.json` files.
#[derive(Debug, Clone)]
pub struct JsonInboxSignalSource {
    inbox: PathBuf,
}

impl JsonInboxSignalSource {
    /// Create a source reading from `inbox`.
    pub fn new(inbox: impl Into<PathBuf>) -> Self {
        Self {
            inbox: inbox.into(),
        }
    }

    /// Inbox directory.
    #[must_use]
    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    async fn pending_files(&self) -> Result<Vec<PathBuf>, SignalSourceError> {
        let mut entries = match tokio::fs::read_dir(&self.inbox).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(unavailable(&self.inbox, &e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| unavailable(&self.inbox, &e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn unavailable(path: &Path, err: &std::io::Error) -> SignalSourceError {
    SignalSourceError::Unavailable {
        message: format!("{}: {err}", path.display()),
    }
}

#[async_trait]
impl SignalSourcePort for JsonInboxSignalSource {
    async fn drain(&self) -> Result<Vec<ReceivedSignal>, SignalSourceError> {
        let mut signals = Vec::new();

        for path in self.pending_files().await? {
            let body = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| unavailable(&path, &e))?;

            match serde_json::from_str::<EntrySignal>(&body) {
                Ok(signal) => {
                    let Some(receipt) = path.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    tracing::debug!(
                        path = %path.display(),
                        symbol = %signal.symbol,
                        side = %signal.side,
                        "Drained entry signal"
                    );
                    signals.push(ReceivedSignal {
                        receipt: receipt.to_string(),
                        signal,
                    });
                }
                Err(e) => {
                    let rejected = path.with_extension("rejected");
                    tracing::error!(
                        path = %path.display(),
                        error = %e,
                        "Unparseable signal file, moving aside"
                    );
                    tokio::fs::rename(&path, &rejected)
                        .await
                        .map_err(|e| unavailable(&path, &e))?;
                }
            }
        }

        Ok(signals)
    }

    async fn settle(
        &self,
        receipt: &str,
        disposition: SignalDisposition,
    ) -> Result<(), SignalSourceError> {
        let path = self.inbox.join(receipt);
        let settled = match disposition {
            SignalDisposition::Decided => tokio::fs::remove_file(&path).await,
            SignalDisposition::Failed => {
                let failed = path.with_extension("failed");
                tracing::warn!(
                    path = %failed.display(),
                    "Signal kept aside without a decision"
                );
                tokio::fs::rename(&path, &failed).await
            }
        };
        settled.map_err(|e| unavailable(&path, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade_group::PositionSide;

    const SIGNAL: &str = r#"{
        "symbol": "BTC/USD",
        "side": "long",
        "entry_price": "50000",
        "stop_price": "49500",
        "take_profit_price": "51000"
    }"#;

    #[tokio::test]
    async fn missing_inbox_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonInboxSignalSource::new(dir.path().join("absent"));
        assert!(source.drain().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn drain_reads_in_name_order_until_settled() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("002.json"), SIGNAL.replace("BTC", "ETH")).unwrap();
        std::fs::write(dir.path().join("001.json"), SIGNAL).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let source = JsonInboxSignalSource::new(dir.path());
        let signals = source.drain().await.unwrap();

        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].receipt, "001.json");
        assert_eq!(signals[0].signal.symbol.as_str(), "BTC/USD");
        assert_eq!(signals[0].signal.side, PositionSide::Long);
        assert_eq!(signals[1].signal.symbol.as_str(), "ETH/USD");

        // Unsettled signals are still pending
        assert_eq!(source.drain().await.unwrap().len(), 2);

        for received in &signals {
            source
                .settle(&received.receipt, SignalDisposition::Decided)
                .await
                .unwrap();
        }
        assert!(source.drain().await.unwrap().is_empty());
        assert!(!dir.path().join("001.json").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn undecided_signal_is_kept_aside() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("001.json"), SIGNAL).unwrap();

        let source = JsonInboxSignalSource::new(dir.path());
        let signals = source.drain().await.unwrap();
        source
            .settle(&signals[0].receipt, SignalDisposition::Failed)
            .await
            .unwrap();

        assert!(source.drain().await.unwrap().is_empty());
        assert!(dir.path().join("001.failed").exists());
    }

    #[tokio::test]
    async fn bad_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();

        let source = JsonInboxSignalSource::new(dir.path());
        assert!(source.drain().await.unwrap().is_empty());
        assert!(dir.path().join("bad.rejected").exists());
        assert!(!dir.path().join("bad.json").exists());
    }
}
