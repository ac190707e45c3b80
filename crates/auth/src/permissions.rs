use serde::{Deserialize, Serialize};

/// A guarded operation.
///
/// Every mutating or sensitive endpoint maps to exactly one action; the allowed
/// roles for each action live in [`allowed_roles`](crate::allowed_roles).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ProjectRead,
    ProjectWrite,
    ProjectArchive,
    ProjectPurge,
    FindingRead,
    FindingWrite,
    FindingPurge,
    AreaRead,
    AreaWrite,
    AreaAssign,
    AreaRevoke,
    UserCreate,
    UserRead,
    PolicyRead,
    AuditRead,
}

impl Action {
    pub const ALL: [Action; 15] = [
        Action::ProjectRead,
        Action::ProjectWrite,
        Action::ProjectArchive,
        Action::ProjectPurge,
        Action::FindingRead,
        Action::FindingWrite,
        Action::FindingPurge,
        Action::AreaRead,
        Action::AreaWrite,
        Action::AreaAssign,
        Action::AreaRevoke,
        Action::UserCreate,
        Action::UserRead,
        Action::PolicyRead,
        Action::AuditRead,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::ProjectRead => "project.read",
            Action::ProjectWrite => "project.write",
            Action::ProjectArchive => "project.archive",
            Action::ProjectPurge => "project.purge",
            Action::FindingRead => "finding.read",
            Action::FindingWrite => "finding.write",
            Action::FindingPurge => "finding.purge",
            Action::AreaRead => "area.read",
            Action::AreaWrite => "area.write",
            Action::AreaAssign => "area.assign",
            Action::AreaRevoke => "area.revoke",
            Action::UserCreate => "user.create",
            Action::UserRead => "user.read",
            Action::PolicyRead => "policy.read",
            Action::AuditRead => "audit.read",
        }
    }

    /// Irreversible operations (hard deletes).
    pub fn is_irreversible(self) -> bool {
        matches!(self, Action::ProjectPurge | Action::FindingPurge)
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s.trim())
            .ok_or_else(|| format!("unknown action '{s}'"))
    }
}
