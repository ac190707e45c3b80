//! In-memory audit bus for tests/dev and single-node deployments.

use std::collections::VecDeque;
use std::sync::{Mutex, mpsc};

use crate::AuditEnvelope;
use crate::bus::{EventBus, Subscription};

#[derive(Debug)]
pub enum InMemoryBusError {
    /// Publish failed due to internal lock poisoning.
    Poisoned,
}

/// In-memory pub/sub bus that also retains the most recent envelopes.
///
/// - No IO / no async
/// - Best-effort fan-out; dead subscribers are dropped on publish
/// - Bounded retention (oldest evicted first) for the audit listing endpoint
#[derive(Debug)]
pub struct InMemoryAuditBus {
    subscribers: Mutex<Vec<mpsc::Sender<AuditEnvelope>>>,
    retained: Mutex<VecDeque<AuditEnvelope>>,
    capacity: usize,
}

impl InMemoryAuditBus {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            retained: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
        }
    }

    /// Retained envelopes, oldest first.
    pub fn retained(&self) -> Vec<AuditEnvelope> {
        match self.retained.lock() {
            Ok(buf) => buf.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for InMemoryAuditBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus<AuditEnvelope> for InMemoryAuditBus {
    type Error = InMemoryBusError;

    fn publish(&self, message: AuditEnvelope) -> Result<(), Self::Error> {
        {
            let mut buf = self.retained.lock().map_err(|_| InMemoryBusError::Poisoned)?;
            if self.capacity > 0 {
                if buf.len() == self.capacity {
                    buf.pop_front();
                }
                buf.push_back(message.clone());
            }
        }

        let mut subs = self.subscribers.lock().map_err(|_| InMemoryBusError::Poisoned)?;
        subs.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription<AuditEnvelope> {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned, we still return a subscription;
        // it just won't receive messages until the process restarts.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}
