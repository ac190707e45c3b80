//! `pentrack-core`: identifiers, domain errors and the request-scoped tenant context.
//!
//! This crate contains no storage or transport concerns. The [`context`] module is
//! the single place where the active tenant of a logical request lives.

pub mod context;
pub mod error;
pub mod id;

pub use context::TenantContext;
pub use error::{DomainError, DomainResult};
pub use id::{AreaId, RecordId, TenantId, UserId};
