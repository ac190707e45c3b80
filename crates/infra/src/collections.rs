//! Collection names and the registry of tenant-scoped collections.

use std::collections::BTreeSet;

pub const PROJECTS: &str = "projects";
pub const FINDINGS: &str = "findings";
pub const AREAS: &str = "areas";
pub const EVIDENCE: &str = "evidence";
pub const AUDIT_ENTRIES: &str = "audit_entries";
pub const USERS: &str = "users";
pub const AREA_ASSIGNMENTS: &str = "area_assignments";

/// Every collection whose records carry a `tenant_id`.
pub const TENANT_SCOPED: &[&str] = &[
    PROJECTS,
    FINDINGS,
    AREAS,
    EVIDENCE,
    AUDIT_ENTRIES,
    USERS,
    AREA_ASSIGNMENTS,
];

/// `(collection, field)` pairs whose values are unique across the whole
/// collection, tenants included.
pub const UNIQUE_FIELDS: &[(&str, &str)] = &[(USERS, "email")];

/// Decides which collections the scoping interceptor rewrites.
///
/// Anything not registered passes through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRegistry {
    scoped: BTreeSet<String>,
}

impl CollectionRegistry {
    pub fn new<I, S>(scoped: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scoped: scoped.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_tenant_scoped(&self, collection: &str) -> bool {
        self.scoped.contains(collection)
    }
}

impl Default for CollectionRegistry {
    fn default() -> Self {
        Self::new(TENANT_SCOPED.iter().copied())
    }
}
