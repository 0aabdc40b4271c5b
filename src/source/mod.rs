// src/source/mod.rs
//! Live position sources

pub mod gpsd;

use crate::error::Result;
use crate::position::PositionSample;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Watches a gpsd daemon and forwards position fixes over a channel
pub struct GpsdSource {
    host: String,
    port: u16,
    running: Arc<AtomicBool>,
}

impl GpsdSource {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Connect and spawn the reader task. The task ends when the stream
    /// closes, the receiver is dropped, or [`GpsdSource::stop`] is called.
    pub async fn start(&self, tx: mpsc::Sender<PositionSample>) -> Result<JoinHandle<()>> {
        info!(host = %self.host, port = self.port, "gpsd_connecting");
        let mut reader = gpsd::connect_gpsd(&self.host, self.port).await?;
        info!("gpsd_connected");

        let running = Arc::clone(&self.running);

        Ok(tokio::spawn(async move {
            let mut line = String::new();

            while running.load(Ordering::Relaxed) {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        info!("gpsd_stream_closed");
                        break;
                    }
                    Ok(_) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match gpsd::parse_gpsd_json(line) {
                            Ok(Some(sample)) => {
                                if tx.send(sample).await.is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => warn!(error = %e, "gpsd_parse_failed"),
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "gpsd_read_failed");
                        break;
                    }
                }
            }
        }))
    }

    /// Stop forwarding samples; safe to call at any time
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
