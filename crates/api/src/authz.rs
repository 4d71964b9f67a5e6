//! API-side authorization guard.
//!
//! This enforces authorization at the request boundary (before touching the
//! store), while keeping domain and store crates auth-agnostic.

use toolroom_auth::{authorize, AuthzError, Permission, Principal, TenantMembership};

use crate::context::{PrincipalContext, TenantContext};

/// Check one permission in the current request context.
///
/// This is intended to be called **before** performing the operation.
pub fn require(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: Permission,
) -> Result<(), AuthzError> {
    let membership = TenantMembership {
        tenant_id: tenant.tenant_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_from_roles(principal.roles()),
    };

    let principal = Principal {
        principal_id: principal.principal_id(),
        active_tenant_id: tenant.tenant_id(),
        membership,
    };

    authorize(&principal, &permission)
}

/// Role→permission mapping.
///
/// This is intentionally simple until a real policy source exists (e.g.
/// DB-backed). Convention: "admin" grants all permissions in the current
/// tenant; "warehouse" covers day-to-day stock movement; "manager" covers
/// project setup and movements.
fn permissions_from_roles(roles: &[toolroom_auth::Role]) -> Vec<Permission> {
    let mut permissions = Vec::new();

    for role in roles {
        match role.as_str() {
            "admin" => return vec![Permission::new("*")],
            "warehouse" => permissions.extend([
                Permission::new("ledger.borrow"),
                Permission::new("ledger.return"),
                Permission::new("catalog.items.create"),
                Permission::new("catalog.items.update"),
            ]),
            "manager" => permissions.extend([
                Permission::new("projects.create"),
                Permission::new("ledger.borrow"),
                Permission::new("ledger.return"),
            ]),
            _ => {}
        }
    }

    permissions
}
