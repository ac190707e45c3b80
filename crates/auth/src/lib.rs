//! `pentrack-auth`: pure authentication/authorization boundary.
//!
//! This crate is decoupled from HTTP and storage: roles, the resolved
//! [`Principal`], credential validation, the RBAC table and the area isolation
//! checks. Identity lookups go through the [`IdentityDirectory`] trait.

pub mod area;
pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod principal;
pub mod resolver;
pub mod roles;
pub mod user;

pub use area::{ResourceAreas, area_restriction, check_area_access};
pub use authorize::{
    AuthorizationExplanation, AuthzError, PolicyEntry, allowed_roles, authorize,
    authorize_role_grant, explain_authorization, grantable_roles, policy_table,
};
pub use claims::{Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError, validate_claims};
pub use permissions::Action;
pub use principal::Principal;
pub use resolver::{AuthnError, IdentityDirectory, IdentityRecord, PrincipalResolver};
pub use roles::{Role, UnknownRole};
pub use user::{
    AreaAssignment, AssignmentState, RegisterUser, RegistrationError, UserAccount, UserStatus,
    plan_registration,
};
