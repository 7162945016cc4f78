//! Outbound half of a connection.
//!
//! All output for one connection goes through a single task fed by an mpsc
//! channel. Each queued string is written and flushed whole, so relay
//! deliveries from the listener task interleave with prompts but never split.

use anyhow::anyhow;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

const OUTBOUND_CAPACITY: usize = 128;

/// Cloneable handle to a connection's writer task.
#[derive(Debug, Clone)]
pub struct SessionWriter {
    tx: mpsc::Sender<String>,
}

impl SessionWriter {
    /// Spawn the writer task. It exits, shutting the transport down, once
    /// every handle is dropped or a write fails.
    pub fn spawn<W>(mut writer: W) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
        let task = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                if let Err(err) = writer.write_all(chunk.as_bytes()).await {
                    debug!(error = %err, "write failed, dropping connection output");
                    break;
                }
                if let Err(err) = writer.flush().await {
                    debug!(error = %err, "flush failed, dropping connection output");
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });
        (Self { tx }, task)
    }

    /// Queue raw text, no newline appended.
    pub async fn send(&self, text: impl Into<String>) -> anyhow::Result<()> {
        self.tx
            .send(text.into())
            .await
            .map_err(|_| anyhow!("connection closed"))
    }

    pub async fn line(&self, text: impl AsRef<str>) -> anyhow::Result<()> {
        self.send(format!("{}\n", text.as_ref())).await
    }
}
