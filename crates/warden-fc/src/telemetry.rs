use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};
use warden_proto::{StreamKind, TelemetrySample};

use crate::vehicle::{SampleSource, Vehicle};

/// Cooperative cancellation flag shared between a watcher and its owner.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this only returns once the flag is set.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingPolicy {
    EverySample,
    /// Deliver at most one sample per period; samples arriving in between are dropped.
    AtMostEvery(Duration),
}

impl SamplingPolicy {
    pub fn from_interval_ms(interval_ms: Option<u64>) -> Self {
        match interval_ms {
            Some(ms) if ms > 0 => SamplingPolicy::AtMostEvery(Duration::from_millis(ms)),
            _ => SamplingPolicy::EverySample,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("{kind} stream failed: {reason}")]
pub struct StreamFailure {
    pub kind: StreamKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Sample(TelemetrySample),
    Cancelled,
    Failed(StreamFailure),
}

/// Hands out independent, cancellable telemetry subscriptions.
#[derive(Clone)]
pub struct TelemetryHub {
    vehicle: Arc<dyn Vehicle>,
}

impl TelemetryHub {
    pub fn new(vehicle: Arc<dyn Vehicle>) -> Self {
        Self { vehicle }
    }

    pub fn subscribe(&self, kind: StreamKind, sampling: SamplingPolicy, cancel: CancelToken) -> Subscription {
        debug!(%kind, ?sampling, "telemetry: subscribe");
        Subscription {
            kind,
            source: self.vehicle.samples(kind),
            sampling,
            cancel,
            last_delivered: None,
            dropped: 0,
        }
    }
}

pub struct Subscription {
    kind: StreamKind,
    source: SampleSource,
    sampling: SamplingPolicy,
    cancel: CancelToken,
    last_delivered: Option<Instant>,
    dropped: u64,
}

impl Subscription {
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Samples discarded by throttling so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Wait for the next deliverable sample. Cancellation wins over a sample
    /// that is ready at the same time.
    pub async fn next(&mut self) -> Delivery {
        loop {
            if self.cancel.is_cancelled() {
                return Delivery::Cancelled;
            }

            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Delivery::Cancelled,
                item = self.source.next() => item,
            };

            match item {
                Some(Ok(sample)) => {
                    if sample.kind() != self.kind {
                        debug!(want = %self.kind, got = %sample.kind(), "telemetry: foreign sample ignored");
                        continue;
                    }
                    let now = Instant::now();
                    if let (SamplingPolicy::AtMostEvery(period), Some(last)) = (self.sampling, self.last_delivered) {
                        if now.duration_since(last) < period {
                            self.dropped += 1;
                            continue;
                        }
                    }
                    self.last_delivered = Some(now);
                    return Delivery::Sample(sample);
                }
                Some(Err(e)) if e.is_recoverable() => {
                    warn!(kind = %self.kind, "telemetry: dropping sample: {}", e);
                }
                Some(Err(e)) => {
                    return Delivery::Failed(StreamFailure { kind: self.kind, reason: e.to_string() });
                }
                None => {
                    return Delivery::Failed(StreamFailure { kind: self.kind, reason: "stream ended".into() });
                }
            }
        }
    }
}
