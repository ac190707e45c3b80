//! Audit publishing/subscription abstraction.
//!
//! The bus distributes [`AuditEnvelope`]s to compliance consumers. It is
//! deliberately lightweight:
//!
//! - **Transport-agnostic**: in-memory channels today, a broker later
//! - **Best-effort fan-out**: every live subscriber gets a copy
//! - **Never blocks the request path**: publish failures are logged, not raised
//!
//! Producers talk to [`AuditSink`], which every [`EventBus`] of envelopes
//! implements.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crate::{AuditEnvelope, SecurityEvent, Severity};

/// A subscription to an audit stream (broadcast semantics).
///
/// Designed for single-consumer use; the receiving side is a blocking std
/// channel so compliance exporters can run on a plain thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Pub/sub abstraction.
///
/// `Send + Sync`: publish may be called concurrently from any request task.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}

/// Producer-side handle used by the tenancy core.
///
/// Recording logs the event at its severity and publishes it; it never fails
/// the caller.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: SecurityEvent);
}

impl<B> AuditSink for B
where
    B: EventBus<AuditEnvelope>,
{
    fn record(&self, event: SecurityEvent) {
        let envelope = AuditEnvelope::observe(event);
        let detail = serde_json::to_string(envelope.event()).unwrap_or_default();

        match envelope.event().severity() {
            Severity::Critical => tracing::error!(
                audit_kind = envelope.event().kind(),
                identity = ?envelope.identity(),
                tenant_id = ?envelope.tenant_id(),
                detail = %detail,
                "SECURITY: tenant isolation breach detected"
            ),
            Severity::Warning => tracing::warn!(
                audit_kind = envelope.event().kind(),
                identity = ?envelope.identity(),
                tenant_id = ?envelope.tenant_id(),
                detail = %detail,
                "security event"
            ),
        }

        if let Err(e) = self.publish(envelope) {
            tracing::error!(error = ?e, "failed to publish audit event");
        }
    }
}
