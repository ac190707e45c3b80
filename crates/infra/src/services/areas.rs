use serde::{Deserialize, Serialize};

use pentrack_auth::{Principal, area_restriction};
use pentrack_core::{AreaId, DomainError, TenantId};

use super::{ServiceResult, decode_all, non_empty, tenant_for_create};
use crate::collections::AREAS;
use crate::scoping::ScopedStore;
use crate::store::{Document, Filter, Query, SortOrder};

/// Organisational sub-unit of a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    pub tenant_id: Option<TenantId>,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewArea {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct AreaService {
    store: ScopedStore,
}

impl AreaService {
    pub fn new(store: ScopedStore) -> Self {
        Self { store }
    }

    /// Areas in scope; restricted roles only see the areas they are assigned.
    pub async fn list(&self, principal: &Principal) -> ServiceResult<Vec<Area>> {
        let filter = match area_restriction(principal) {
            None => Filter::All,
            Some(assigned) => Filter::any_of("id", assigned.iter().map(|a| a.to_string())),
        };
        let docs = self
            .store
            .find(AREAS, Query::new(filter).sort_by("name", SortOrder::Asc))
            .await?;
        decode_all(&docs)
    }

    pub async fn create(&self, _principal: &Principal, request: NewArea) -> ServiceResult<Area> {
        let name = non_empty(&request.name, "area name")?;
        let tenant_id = tenant_for_create()?;

        let clash = Filter::tenant(tenant_id).and(Filter::equals("name", name.clone()));
        if self.store.count(AREAS, clash).await? > 0 {
            return Err(DomainError::conflict(format!("area '{name}' already exists")).into());
        }

        let area = Area {
            id: AreaId::new(),
            tenant_id: Some(tenant_id),
            name,
        };
        self.store.insert(AREAS, Document::encode(&area)?).await?;
        Ok(area)
    }
}
