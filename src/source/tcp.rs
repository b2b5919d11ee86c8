//! TCP reading source.
//!
//! Accepts any number of clients; each sends newline-delimited JSON readings.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use podwatch_core::RawReading;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::stream::forward_lines;
use super::ReadingSource;

/// A source listening for NDJSON clients on a TCP port.
#[derive(Debug)]
pub struct TcpSource {
    receiver: mpsc::Receiver<RawReading>,
    local_addr: SocketAddr,
    description: String,
    accept_task: JoinHandle<()>,
}

impl TcpSource {
    /// Bind and start accepting clients.
    pub async fn bind(addr: &str, buffer: usize) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (tx, rx) = mpsc::channel(buffer.max(1));
        info!(address = %local_addr, "Listening for telemetry clients");

        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        info!(peer = %peer, "Telemetry client connected");
                        let errors = Arc::new(Mutex::new(None));
                        tokio::spawn(forward_lines(
                            stream,
                            tx.clone(),
                            peer.to_string(),
                            errors,
                        ));
                    }
                    Err(e) => warn!(error = %e, "Failed to accept client"),
                }
            }
        });

        Ok(Self {
            receiver: rx,
            local_addr,
            description: format!("tcp: {}", local_addr),
            accept_task,
        })
    }

    /// The address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for TcpSource {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

#[async_trait]
impl ReadingSource for TcpSource {
    async fn recv(&mut self) -> Option<RawReading> {
        self.receiver.recv().await
    }

    fn description(&self) -> &str {
        &self.description
    }
}
