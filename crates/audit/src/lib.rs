//! Security audit events: the side channel compliance consumers subscribe to.
//!
//! Isolation violations, RBAC and area denials, rejected tenant overrides and
//! fail-closed scoping errors are published here as structured
//! [`SecurityEvent`]s instead of being swallowed.

pub mod bus;
pub mod envelope;
pub mod in_memory_bus;
pub mod security;

pub use bus::{AuditSink, EventBus, Subscription};
pub use envelope::AuditEnvelope;
pub use in_memory_bus::{InMemoryAuditBus, InMemoryBusError};
pub use security::{SecurityEvent, Severity};
