//! Event source adapters and the pump that feeds the store.
//!
//! The hosted backend delivers row changes over a long-lived channel that can
//! lag, drop, and reconnect. The pump turns each delivered message into exactly
//! one `ingest` call, processed to completion before the next message is read.
//! Replays after a reconnect are absorbed by the store's idempotent ingest.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use flowboard_core::defaults;
use flowboard_core::{ChangePayload, Error, Result};

use crate::store::{IngestOutcome, RealtimeStore};

/// One message read from an event source.
#[derive(Debug, Clone)]
pub enum SourceMessage {
    /// A decoded row change.
    Payload(ChangePayload),
    /// A raw JSON text frame, decoded by the pump.
    Frame(String),
    /// The receiver fell behind and missed this many messages.
    Lagged(u64),
    /// The channel closed. The store keeps serving its last snapshot.
    Disconnected,
}

/// Push-delivery channel of activity changes.
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next message.
    async fn next_message(&mut self) -> SourceMessage;
}

#[async_trait]
impl EventSource for broadcast::Receiver<ChangePayload> {
    async fn next_message(&mut self) -> SourceMessage {
        match self.recv().await {
            Ok(payload) => SourceMessage::Payload(payload),
            Err(broadcast::error::RecvError::Lagged(n)) => SourceMessage::Lagged(n),
            Err(broadcast::error::RecvError::Closed) => SourceMessage::Disconnected,
        }
    }
}

#[async_trait]
impl EventSource for mpsc::Receiver<ChangePayload> {
    async fn next_message(&mut self) -> SourceMessage {
        match self.recv().await {
            Some(payload) => SourceMessage::Payload(payload),
            None => SourceMessage::Disconnected,
        }
    }
}

#[async_trait]
impl EventSource for mpsc::Receiver<String> {
    async fn next_message(&mut self) -> SourceMessage {
        match self.recv().await {
            Some(frame) => SourceMessage::Frame(frame),
            None => SourceMessage::Disconnected,
        }
    }
}

/// Broadcast channel for change payloads, sized for the pump.
pub fn change_channel() -> (
    broadcast::Sender<ChangePayload>,
    broadcast::Receiver<ChangePayload>,
) {
    broadcast::channel(defaults::SOURCE_CHANNEL_CAPACITY)
}

/// Adapt a broadcast receiver into a stream of payloads, skipping lag gaps.
pub fn payload_stream(
    rx: broadcast::Receiver<ChangePayload>,
) -> impl Stream<Item = ChangePayload> + Send + Unpin {
    BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(error = %e, "Payload stream lagged, skipping gap");
                None
            }
        }
    })
    .boxed()
}

/// Counters for one pump run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PumpReport {
    /// Messages carrying a payload or frame.
    pub received: u64,
    /// Ingests that changed the visible log.
    pub applied: u64,
    /// Duplicates, discarded arrivals, and skipped rows.
    pub absorbed: u64,
    /// Malformed payloads or undecodable frames.
    pub rejected: u64,
    /// Messages the source reported as missed.
    pub missed: u64,
    /// The store was reset under a pinned pump, which then stopped.
    pub superseded: bool,
}

/// Drives an [`EventSource`] into a [`RealtimeStore`].
#[derive(Debug, Clone)]
pub struct IngestPump {
    store: Arc<RealtimeStore>,
    generation: Option<u64>,
}

impl IngestPump {
    pub fn new(store: Arc<RealtimeStore>) -> Self {
        Self {
            store,
            generation: None,
        }
    }

    /// Bind the pump to the store's current generation. Once the store is
    /// reset the pump ingests nothing more and stops at the next message.
    pub fn pinned(mut self) -> Self {
        self.generation = Some(self.store.generation());
        self
    }

    pub fn store(&self) -> &Arc<RealtimeStore> {
        &self.store
    }

    /// Read from `source` until it disconnects.
    pub async fn run<S: EventSource>(&self, mut source: S) -> PumpReport {
        info!(subsystem = "source", "Event source pump started");
        let mut report = PumpReport::default();

        loop {
            let result = match source.next_message().await {
                SourceMessage::Payload(payload) => self
                    .store
                    .ingest_payload_within(payload, self.generation),
                SourceMessage::Frame(frame) => {
                    self.store.ingest_frame_within(&frame, self.generation)
                }
                SourceMessage::Lagged(n) => {
                    report.missed += n;
                    warn!(missed = n, "Event source lagged, missed events");
                    continue;
                }
                SourceMessage::Disconnected => {
                    let notice = Error::SourceDisconnected("channel closed".to_string());
                    info!(
                        subsystem = "source",
                        reason = %notice,
                        retained = self.store.len(),
                        "Event source disconnected, pump stopping"
                    );
                    break;
                }
            };

            if !Self::record(result, &mut report) {
                info!(subsystem = "source", "Store was reset, pump stopping");
                break;
            }
        }

        report
    }

    /// Consume a stream of payloads until it ends.
    pub async fn run_stream<St>(&self, stream: St) -> PumpReport
    where
        St: Stream<Item = ChangePayload> + Unpin,
    {
        let mut stream = stream;
        let mut report = PumpReport::default();
        while let Some(payload) = stream.next().await {
            let result = self.store.ingest_payload_within(payload, self.generation);
            if !Self::record(result, &mut report) {
                break;
            }
        }
        debug!(received = report.received, "Payload stream ended");
        report
    }

    /// Run the pump on the tokio runtime.
    pub fn spawn<S>(self, source: S) -> JoinHandle<PumpReport>
    where
        S: EventSource + 'static,
    {
        tokio::spawn(async move { self.run(source).await })
    }

    /// Count one ingest. Returns `false` once the pump has been superseded.
    fn record(result: Result<IngestOutcome>, report: &mut PumpReport) -> bool {
        report.received += 1;
        match result {
            Ok(IngestOutcome::Stale) => {
                report.superseded = true;
                return false;
            }
            Ok(outcome) if outcome.changed() => report.applied += 1,
            Ok(_) => report.absorbed += 1,
            // Already logged and counted by the store.
            Err(_) => report.rejected += 1,
        }
        true
    }
}
