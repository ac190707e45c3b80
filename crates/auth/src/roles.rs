use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Global role of an identity.
///
/// Variants are ordered from most to least privileged; [`Role::rank`] exposes
/// that order for comparisons.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Owner,
    PlatformAdmin,
    ClientAdmin,
    AreaAdmin,
    Analyst,
    Viewer,
}

impl Role {
    /// Every role, most privileged first.
    pub const ALL: [Role; 6] = [
        Role::Owner,
        Role::PlatformAdmin,
        Role::ClientAdmin,
        Role::AreaAdmin,
        Role::Analyst,
        Role::Viewer,
    ];

    /// Position in the hierarchy (0 = most privileged).
    pub fn rank(self) -> u8 {
        match self {
            Role::Owner => 0,
            Role::PlatformAdmin => 1,
            Role::ClientAdmin => 2,
            Role::AreaAdmin => 3,
            Role::Analyst => 4,
            Role::Viewer => 5,
        }
    }

    /// Roles that act across tenants (automatic tenant filtering is inert).
    pub fn is_global(self) -> bool {
        matches!(self, Role::Owner | Role::PlatformAdmin)
    }

    /// Roles restricted to their assigned areas inside a tenant.
    pub fn is_area_restricted(self) -> bool {
        matches!(self, Role::AreaAdmin | Role::Analyst | Role::Viewer)
    }

    /// Administrative roles (everything above ANALYST).
    pub fn is_admin_tier(self) -> bool {
        matches!(
            self,
            Role::Owner | Role::PlatformAdmin | Role::ClientAdmin | Role::AreaAdmin
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::PlatformAdmin => "PLATFORM_ADMIN",
            Role::ClientAdmin => "CLIENT_ADMIN",
            Role::AreaAdmin => "AREA_ADMIN",
            Role::Analyst => "ANALYST",
            Role::Viewer => "VIEWER",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("client_admin".parse::<Role>().unwrap(), Role::ClientAdmin);
        assert_eq!(" VIEWER ".parse::<Role>().unwrap(), Role::Viewer);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&Role::PlatformAdmin).unwrap();
        assert_eq!(json, "\"PLATFORM_ADMIN\"");
        let back: Role = serde_json::from_str("\"AREA_ADMIN\"").unwrap();
        assert_eq!(back, Role::AreaAdmin);
    }

    #[test]
    fn rank_follows_declaration_order() {
        for pair in Role::ALL.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }
}
