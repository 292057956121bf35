//! Fire-and-forget telemetry: a bounded channel the handler never awaits
//! for completion on the response path. If the buffer is full, the event is
//! dropped — an overloaded telemetry sink must never slow down or fail a
//! spend decision (spec.md §5, "a small telemetry buffer (bounded, drops on
//! overflow)").

#![allow(missing_docs)]

use tokio::sync::mpsc;

/// One terminal-state event per request (spec.md §4.5).
#[derive(Debug, Clone)]
pub struct SpendEvent {
    pub result: &'static str,
    pub response_time_ms: u64,
    pub in_grace_period: bool,
    pub grace_protected: Option<bool>,
    pub idempotent: Option<bool>,
    pub remaining: Option<u32>,
}

/// Sending half of the telemetry channel, cloned into each request's scope.
#[derive(Clone)]
pub struct TelemetrySink {
    tx: mpsc::Sender<SpendEvent>,
}

impl TelemetrySink {
    /// Emit an event without waiting. Never blocks; silently drops the
    /// event if the bounded channel is full.
    pub fn emit(&self, event: SpendEvent) {
        if let Err(err) = self.tx.try_send(event) {
            tracing::debug!(?err, "telemetry buffer full, dropping event");
        }
    }
}

/// Create a bounded telemetry channel. The receiver is handed to whatever
/// sink forwards events onward (a log line, an HTTP collector, ...); the
/// core crate only produces events, it never ships them anywhere itself
/// (spec.md §1, "telemetry transport" is out of scope).
pub fn channel(capacity: usize) -> (TelemetrySink, mpsc::Receiver<SpendEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (TelemetrySink { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_delivers_when_capacity_available() {
        let (sink, mut rx) = channel(4);
        sink.emit(SpendEvent {
            result: "ok",
            response_time_ms: 5,
            in_grace_period: false,
            grace_protected: None,
            idempotent: Some(false),
            remaining: Some(2),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.result, "ok");
        assert_eq!(event.remaining, Some(2));
    }

    #[tokio::test]
    async fn emit_drops_silently_when_full() {
        let (sink, _rx) = channel(1);
        let make = || SpendEvent {
            result: "ok",
            response_time_ms: 0,
            in_grace_period: false,
            grace_protected: None,
            idempotent: None,
            remaining: None,
        };
        sink.emit(make());
        sink.emit(make()); // would block without try_send; must not panic
    }
}
