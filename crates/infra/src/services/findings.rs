use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use pentrack_auth::{Principal, area_restriction};
use pentrack_core::{DomainError, RecordId, TenantId};

use super::{ServiceError, ServiceResult, decode_all, non_empty};
use crate::collections::FINDINGS;
use crate::scoping::ScopedStore;
use crate::services::ProjectService;
use crate::store::{Document, Filter, Query, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    #[default]
    Open,
    Remediated,
    Accepted,
}

/// A finding. Area membership is inherited from the owning project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub id: RecordId,
    pub tenant_id: Option<TenantId>,
    pub project_id: RecordId,
    pub title: String,
    pub severity: Severity,
    #[serde(default)]
    pub status: FindingStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFinding {
    pub project_id: RecordId,
    pub title: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindingPatch {
    pub title: Option<String>,
    pub severity: Option<Severity>,
    pub status: Option<FindingStatus>,
}

#[derive(Debug, Clone)]
pub struct FindingService {
    store: ScopedStore,
    projects: ProjectService,
}

impl FindingService {
    pub fn new(store: ScopedStore, projects: ProjectService) -> Self {
        Self { store, projects }
    }

    /// Findings visible to `principal`, optionally for one project.
    pub async fn list(
        &self,
        principal: &Principal,
        project_id: Option<RecordId>,
    ) -> ServiceResult<Vec<Finding>> {
        let filter = match project_id {
            Some(pid) => {
                let project = self.projects.get(principal, pid).await?;
                Filter::equals("project_id", project.id.to_string())
            }
            None if area_restriction(principal).is_some() => {
                let visible = self.projects.list(principal, true).await?;
                Filter::any_of("project_id", visible.iter().map(|p| p.id.to_string()))
            }
            None => Filter::All,
        };

        let docs = self
            .store
            .find(FINDINGS, Query::new(filter).sort_by("title", SortOrder::Asc))
            .await?;
        decode_all(&docs)
    }

    pub async fn get(&self, principal: &Principal, id: RecordId) -> ServiceResult<Finding> {
        let finding: Finding = self
            .store
            .find_by_id(FINDINGS, id)
            .await?
            .ok_or(ServiceError::NotFound)?
            .decode()?;

        self.projects.get(principal, finding.project_id).await?;
        Ok(finding)
    }

    pub async fn create(&self, principal: &Principal, request: NewFinding) -> ServiceResult<Finding> {
        let project = self.projects.get(principal, request.project_id).await?;
        if project.archived {
            return Err(DomainError::validation("project is archived").into());
        }

        let finding = Finding {
            id: RecordId::new(),
            tenant_id: project.tenant_id,
            project_id: project.id,
            title: non_empty(&request.title, "finding title")?,
            severity: request.severity,
            status: FindingStatus::Open,
        };
        self.store.insert(FINDINGS, Document::encode(&finding)?).await?;
        Ok(finding)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: RecordId,
        patch: FindingPatch,
    ) -> ServiceResult<Finding> {
        let mut finding = self.get(principal, id).await?;
        let mut changes = Map::new();

        if let Some(title) = patch.title {
            finding.title = non_empty(&title, "finding title")?;
            changes.insert("title".to_string(), Value::String(finding.title.clone()));
        }
        if let Some(severity) = patch.severity {
            finding.severity = severity;
            changes.insert("severity".to_string(), json!(severity));
        }
        if let Some(status) = patch.status {
            finding.status = status;
            changes.insert("status".to_string(), json!(status));
        }

        if !changes.is_empty() {
            self.store.update_by_id(FINDINGS, id, changes).await?;
        }
        Ok(finding)
    }

    pub async fn purge(&self, principal: &Principal, id: RecordId) -> ServiceResult<()> {
        let finding = self.get(principal, id).await?;
        self.store.delete(FINDINGS, Filter::id(finding.id)).await?;
        tracing::warn!(finding_id = %finding.id, "finding purged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use pentrack_audit::InMemoryAuditBus;
    use pentrack_auth::{AuthzError, Role};
    use pentrack_core::{AreaId, TenantContext, UserId, context};

    use super::*;
    use crate::services::{AreaService, NewArea, NewProject};
    use crate::store::InMemoryDocumentStore;

    fn principal(role: Role, tenant: TenantId, areas: &[AreaId]) -> Principal {
        Principal {
            identity: UserId::new(),
            role,
            home_tenant_id: Some(tenant),
            tenant_ids: vec![],
            area_ids: areas.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    #[tokio::test]
    async fn findings_inherit_project_areas() {
        let store = ScopedStore::new(
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryAuditBus::new()),
        );
        let areas = AreaService::new(store.clone());
        let projects = ProjectService::new(store.clone());
        let findings = FindingService::new(store, projects.clone());

        let t = TenantId::new();
        let admin = principal(Role::ClientAdmin, t, &[]);
        let ctx = TenantContext::for_tenant(admin.identity, t);

        context::scope(ctx, async {
            let a1 = areas.create(&admin, NewArea { name: "a1".into() }).await.unwrap().id;
            let a2 = areas.create(&admin, NewArea { name: "a2".into() }).await.unwrap().id;
            let p1 = projects
                .create(&admin, NewProject { name: "p1".into(), area_ids: vec![a1] })
                .await
                .unwrap();
            let p2 = projects
                .create(&admin, NewProject { name: "p2".into(), area_ids: vec![a2] })
                .await
                .unwrap();

            let new = |project_id, title: &str| NewFinding {
                project_id,
                title: title.into(),
                severity: Severity::High,
            };
            let visible = findings.create(&admin, new(p1.id, "xss")).await.unwrap();
            let hidden = findings.create(&admin, new(p2.id, "sqli")).await.unwrap();
            assert_eq!(visible.tenant_id, Some(t));

            let analyst = principal(Role::Analyst, t, &[a1]);
            assert_eq!(findings.list(&analyst, None).await.unwrap(), vec![visible.clone()]);
            assert_eq!(
                findings.get(&analyst, hidden.id).await.unwrap_err(),
                ServiceError::Forbidden(AuthzError::AreaDenied)
            );
            assert!(findings.list(&analyst, Some(p2.id)).await.is_err());

            let report = projects.report(&analyst, p1.id).await.unwrap();
            assert_eq!(report.project, p1);
            assert_eq!(report.findings, vec![visible.clone()]);
            assert!(projects.report(&analyst, p2.id).await.is_err());

            let patched = findings
                .update(
                    &analyst,
                    visible.id,
                    FindingPatch {
                        status: Some(FindingStatus::Remediated),
                        ..FindingPatch::default()
                    },
                )
                .await
                .unwrap();
            assert_eq!(patched.status, FindingStatus::Remediated);
            assert_eq!(findings.get(&admin, visible.id).await.unwrap().status, FindingStatus::Remediated);

            assert_eq!(findings.list(&admin, None).await.unwrap().len(), 2);
        })
        .await;
    }

    #[tokio::test]
    async fn cannot_file_against_archived_project() {
        let store = ScopedStore::new(
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryAuditBus::new()),
        );
        let projects = ProjectService::new(store.clone());
        let findings = FindingService::new(store, projects.clone());
        let t = TenantId::new();
        let admin = principal(Role::ClientAdmin, t, &[]);

        context::scope(TenantContext::for_tenant(admin.identity, t), async {
            let p = projects
                .create(&admin, NewProject { name: "p".into(), area_ids: vec![] })
                .await
                .unwrap();
            projects.archive(&admin, p.id).await.unwrap();
            let err = findings
                .create(&admin, NewFinding { project_id: p.id, title: "t".into(), severity: Severity::Low })
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
        })
        .await;
    }
}
