//! `toolroom-auth` — authentication/authorization boundary (zero-trust).
//!
//! Claims validation and the authorization check are pure and deterministic;
//! token signature verification lives behind the [`JwtValidator`] seam.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, AuthzError, Principal};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use principal::{PrincipalId, TenantMembership};
pub use roles::Role;
