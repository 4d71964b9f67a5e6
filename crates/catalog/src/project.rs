use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use toolroom_core::{DomainError, DomainResult, ProjectId, TenantId, UserId};

/// Lifecycle status of a project.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planned,
    Active,
    OnHold,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planned => "planned",
            ProjectStatus::Active => "active",
            ProjectStatus::OnHold => "on_hold",
            ProjectStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "planned" => Ok(ProjectStatus::Planned),
            "active" => Ok(ProjectStatus::Active),
            "on_hold" => Ok(ProjectStatus::OnHold),
            "completed" => Ok(ProjectStatus::Completed),
            other => Err(DomainError::validation(format!(
                "unknown project status '{other}'"
            ))),
        }
    }
}

/// An allocation target: a tenant's project that can check items out of the
/// pool. Owns zero or more allocations and ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub project_id: ProjectId,
    pub tenant_id: TenantId,
    pub name: String,
    pub client_id: Option<UserId>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(
        tenant_id: TenantId,
        project_id: ProjectId,
        name: &str,
        client_id: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(Self {
            project_id,
            tenant_id,
            name: trimmed.to_string(),
            client_id,
            status: ProjectStatus::Planned,
            created_at: now,
            updated_at: now,
        })
    }
}
