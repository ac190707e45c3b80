//! Post-fetch tenant invariant.
//!
//! Runs after every scoped read. With correct scoping it never fires; when it
//! does, the filter injection has a hole and the read must not reach a handler.

use thiserror::Error;

use pentrack_core::{RecordId, TenantContext, TenantId};

use crate::store::Document;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("tenant isolation violation in '{collection}': record {record_id} belongs to another tenant")]
pub struct IsolationViolation {
    pub collection: String,
    pub record_id: RecordId,
    pub expected: Option<TenantId>,
    pub found: TenantId,
}

/// Verify that no returned document names a tenant other than the active one.
///
/// Global contexts are exempt. Tenant-less documents are not checked.
pub fn check_documents(
    ctx: &TenantContext,
    collection: &str,
    documents: &[Document],
) -> Result<(), IsolationViolation> {
    if ctx.is_global() {
        return Ok(());
    }

    let expected = ctx.tenant_id();
    for doc in documents {
        if let Some(found) = doc.tenant_id {
            if Some(found) != expected {
                return Err(IsolationViolation {
                    collection: collection.to_string(),
                    record_id: doc.id,
                    expected,
                    found,
                });
            }
        }
    }
    Ok(())
}
