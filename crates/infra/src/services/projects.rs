use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use pentrack_auth::{AuthzError, Principal, ResourceAreas, area_restriction};
use pentrack_core::{AreaId, DomainError, RecordId, TenantId};

use super::{
    ServiceError, ServiceResult, area_filter, decode_all, enforce_area, non_empty, record_id,
    tenant_for_create,
};
use crate::collections::{AREAS, FINDINGS, PROJECTS};
use crate::pipeline::Pipeline;
use crate::scoping::ScopedStore;
use crate::services::Finding;
use crate::store::{Document, Filter, Query, SortOrder, StoreError};

/// Assessment project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: RecordId,
    pub tenant_id: Option<TenantId>,
    pub name: String,
    /// Legacy single-area reference.
    #[serde(default)]
    pub area_id: Option<AreaId>,
    #[serde(default)]
    pub area_ids: Vec<AreaId>,
    #[serde(default)]
    pub archived: bool,
}

impl Project {
    pub fn areas(&self) -> ResourceAreas {
        ResourceAreas::new(self.area_id, self.area_ids.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub area_ids: Vec<AreaId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub area_ids: Option<Vec<AreaId>>,
}

/// A project with its findings attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    #[serde(flatten)]
    pub project: Project,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone)]
pub struct ProjectService {
    store: ScopedStore,
}

impl ProjectService {
    pub fn new(store: ScopedStore) -> Self {
        Self { store }
    }

    /// Projects visible to `principal`, narrowed to its areas when restricted.
    pub async fn list(&self, principal: &Principal, include_archived: bool) -> ServiceResult<Vec<Project>> {
        let mut filter = Filter::All;
        if !include_archived {
            // Records written before the flag existed count as active.
            filter = filter.and(Filter::Or(vec![
                Filter::equals("archived", false),
                Filter::equals("archived", Value::Null),
            ]));
        }
        if let Some(assigned) = area_restriction(principal) {
            filter = filter.and(area_filter(assigned));
        }

        let docs = self
            .store
            .find(PROJECTS, Query::new(filter).sort_by("name", SortOrder::Asc))
            .await?;
        decode_all(&docs)
    }

    pub async fn get(&self, principal: &Principal, id: RecordId) -> ServiceResult<Project> {
        let project: Project = self
            .store
            .find_by_id(PROJECTS, id)
            .await?
            .ok_or(ServiceError::NotFound)?
            .decode()?;

        enforce_area(&self.store, principal, PROJECTS, id, &project.areas())?;
        Ok(project)
    }

    /// Load a project and its findings in one scoped aggregation.
    pub async fn report(&self, principal: &Principal, id: RecordId) -> ServiceResult<ProjectReport> {
        let project = self.get(principal, id).await?;
        let pipeline = Pipeline::new()
            .matching(Filter::id(project.id))
            .lookup(FINDINGS, "id", "project_id", "findings");

        let row = self
            .store
            .aggregate(PROJECTS, &pipeline)
            .await?
            .into_iter()
            .next()
            .ok_or(ServiceError::NotFound)?;
        let mut report: ProjectReport =
            serde_json::from_value(Value::Object(row)).map_err(StoreError::corrupt)?;
        report.findings.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(report)
    }

    pub async fn create(&self, principal: &Principal, request: NewProject) -> ServiceResult<Project> {
        let name = non_empty(&request.name, "project name")?;
        let tenant_id = tenant_for_create()?;
        let area_ids = dedup(request.area_ids);
        self.validate_areas(principal, tenant_id, &area_ids).await?;

        let project = Project {
            id: RecordId::new(),
            tenant_id: Some(tenant_id),
            name,
            area_id: None,
            area_ids,
            archived: false,
        };
        self.store.insert(PROJECTS, Document::encode(&project)?).await?;

        tracing::info!(project_id = %project.id, tenant_id = %tenant_id, "project created");
        Ok(project)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: RecordId,
        patch: ProjectPatch,
    ) -> ServiceResult<Project> {
        let mut project = self.get(principal, id).await?;
        let mut changes = Map::new();

        if let Some(name) = patch.name {
            project.name = non_empty(&name, "project name")?;
            changes.insert("name".to_string(), Value::String(project.name.clone()));
        }
        if let Some(area_ids) = patch.area_ids {
            let tenant_id = project
                .tenant_id
                .ok_or_else(|| DomainError::validation("project has no tenant"))?;
            let area_ids = dedup(area_ids);
            self.validate_areas(principal, tenant_id, &area_ids).await?;
            changes.insert("area_ids".to_string(), json!(area_ids));
            project.area_ids = area_ids;
        }

        if !changes.is_empty() {
            self.store.update_by_id(PROJECTS, id, changes).await?;
        }
        Ok(project)
    }

    pub async fn archive(&self, principal: &Principal, id: RecordId) -> ServiceResult<Project> {
        let mut project = self.get(principal, id).await?;
        if !project.archived {
            let mut changes = Map::new();
            changes.insert("archived".to_string(), Value::Bool(true));
            self.store.update_by_id(PROJECTS, id, changes).await?;
            project.archived = true;
        }
        Ok(project)
    }

    /// Irreversibly delete a project and its findings.
    pub async fn purge(&self, principal: &Principal, id: RecordId) -> ServiceResult<()> {
        let project = self.get(principal, id).await?;

        let findings = self
            .store
            .delete(FINDINGS, Filter::equals("project_id", project.id.to_string()))
            .await?;
        self.store.delete(PROJECTS, Filter::id(project.id)).await?;

        tracing::warn!(project_id = %project.id, findings, "project purged");
        Ok(())
    }

    /// Every referenced area must exist in the project's tenant; restricted
    /// creators may only reference areas they are assigned.
    async fn validate_areas(
        &self,
        principal: &Principal,
        tenant_id: TenantId,
        area_ids: &[AreaId],
    ) -> ServiceResult<()> {
        if let Some(assigned) = area_restriction(principal) {
            if area_ids.is_empty() || !area_ids.iter().all(|a| assigned.contains(a)) {
                return Err(AuthzError::AreaDenied.into());
            }
        }

        for area_id in area_ids {
            let area = self
                .store
                .find_by_id(AREAS, record_id(*area_id))
                .await?
                .ok_or_else(|| DomainError::validation(format!("unknown area {area_id}")))?;
            if area.tenant_id != Some(tenant_id) {
                return Err(DomainError::validation(format!(
                    "area {area_id} belongs to a different tenant"
                ))
                .into());
            }
        }
        Ok(())
    }
}

fn dedup(mut ids: Vec<AreaId>) -> Vec<AreaId> {
    ids.sort();
    ids.dedup();
    ids
}
