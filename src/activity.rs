//! Append-only JSONL activity log.
//!
//! `append` is best-effort and never blocks: records go through a channel
//! to a single writer task, and write failures are reported via tracing and
//! otherwise dropped. Nothing in the bot reads the file back.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    #[serde(rename = "timestamp")]
    pub ts: DateTime<Utc>,
    #[serde(rename = "chatId")]
    pub chat_id: i64,
    #[serde(flatten)]
    pub event: LogEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "direction", rename_all = "lowercase")]
pub enum LogEvent {
    In {
        user: String,
        text: String,
        target: String,
    },
    Out {
        text: String,
    },
    Error {
        error: String,
    },
}

impl LogRecord {
    pub fn new(chat_id: i64, event: LogEvent) -> Self {
        Self {
            ts: Utc::now(),
            chat_id,
            event,
        }
    }

    pub fn direction(&self) -> &'static str {
        match self.event {
            LogEvent::In { .. } => "in",
            LogEvent::Out { .. } => "out",
            LogEvent::Error { .. } => "error",
        }
    }
}

/// Destination for activity records.
pub trait ActivitySink: Send + Sync {
    /// Queue a record. Must not block and must not fail.
    fn append(&self, record: LogRecord);
}

enum WriterMsg {
    Record(LogRecord),
    Flush(oneshot::Sender<()>),
}

/// JSONL file sink backed by a background writer task.
pub struct ActivityLog {
    tx: mpsc::UnboundedSender<WriterMsg>,
}

impl ActivityLog {
    /// Create the parent directory and file if needed and start the writer.
    /// If the file cannot be opened the log still works but discards records.
    pub async fn open(path: &Path) -> Self {
        let file = match open_append(path).await {
            Ok(file) => {
                info!("Activity log: {}", path.display());
                Some(file)
            }
            Err(e) => {
                warn!("Activity log disabled, cannot open {}: {:#}", path.display(), e);
                None
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(path.to_path_buf(), file, rx));
        Self { tx }
    }

    /// Wait until every record queued before this call has been written.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriterMsg::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

impl ActivitySink for ActivityLog {
    fn append(&self, record: LogRecord) {
        let _ = self.tx.send(WriterMsg::Record(record));
    }
}

async fn open_append(path: &Path) -> anyhow::Result<tokio::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    Ok(file)
}

async fn run_writer(
    path: PathBuf,
    mut file: Option<tokio::fs::File>,
    mut rx: mpsc::UnboundedReceiver<WriterMsg>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            WriterMsg::Record(record) => {
                let Some(f) = file.as_mut() else { continue };
                if let Err(e) = write_record(f, &record).await {
                    debug!(
                        "Activity log write ({}) to {} failed: {}",
                        record.direction(),
                        path.display(),
                        e
                    );
                }
            }
            WriterMsg::Flush(done) => {
                if let Some(f) = file.as_mut() {
                    let _ = f.flush().await;
                }
                let _ = done.send(());
            }
        }
    }
}

async fn write_record(file: &mut tokio::fs::File, record: &LogRecord) -> anyhow::Result<()> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    file.write_all(line.as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Collects records in memory.
    #[derive(Default)]
    pub struct MemorySink {
        records: Mutex<Vec<LogRecord>>,
    }

    impl MemorySink {
        pub fn records(&self) -> Vec<LogRecord> {
            self.records.lock().unwrap().clone()
        }

        pub fn directions(&self) -> Vec<&'static str> {
            self.records().iter().map(LogRecord::direction).collect()
        }
    }

    impl ActivitySink for MemorySink {
        fn append(&self, record: LogRecord) {
            self.records.lock().unwrap().push(record);
        }
    }
}
