//! Role-based routing after sign-in and the admin API guard.

use serde::Serialize;

use super::error::{DomainError, DomainResult};
use crate::models::user::DashboardRoute;
use crate::models::{Permission, UserRole};

/// Dashboard subtree served by the `/v1/admin` endpoints.
pub const ADMIN_DASHBOARD: &str = "/dashboard/admin";

/// Paths every signed-in user may open.
pub const PUBLIC_PATHS: [&str; 6] = [
    "/",
    "/destinos",
    "/servicios",
    "/intermediarios",
    "/proceso-completo",
    "/como-funciona",
];

pub fn dashboard_route(role: UserRole) -> &'static str {
    role.dashboard().path
}

/// Admins go anywhere; others reach their own dashboard subtree and the
/// public pages.
pub fn can_access_route(role: UserRole, path: &str) -> bool {
    role.is_admin()
        || path.starts_with(dashboard_route(role))
        || PUBLIC_PATHS.contains(&path)
}

pub fn has_permission(role: UserRole, permission: Permission) -> bool {
    role.has_permission(permission)
}

/// Admin API access: the role must reach the admin dashboard and hold
/// `permission`.
pub fn authorize_admin(role: UserRole, permission: Permission) -> DomainResult<()> {
    if !can_access_route(role, ADMIN_DASHBOARD) {
        return Err(DomainError::Forbidden(format!(
            "Role {} cannot access the admin panel",
            role
        )));
    }
    if !has_permission(role, permission) {
        return Err(DomainError::Forbidden(format!(
            "Role {} lacks permission {:?}",
            role, permission
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleDashboard {
    pub role: UserRole,
    pub role_label: &'static str,
    pub dashboard: DashboardRoute,
    pub permissions: Vec<Permission>,
}

pub fn describe(role: UserRole) -> RoleDashboard {
    RoleDashboard {
        role,
        role_label: role.label(),
        dashboard: role.dashboard(),
        permissions: role.permissions().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_reaches_everything() {
        assert!(can_access_route(UserRole::SuperAdmin, "/notaria/documents"));
        assert!(can_access_route(UserRole::Admin, "/management"));
    }

    #[test]
    fn test_own_dashboard_prefix() {
        assert!(can_access_route(UserRole::Broker, "/dashboard/broker/commissions"));
        assert!(!can_access_route(UserRole::Broker, "/dashboard/admin"));
        assert!(can_access_route(UserRole::Notaria, "/notaria"));
    }

    #[test]
    fn test_public_paths_are_exact() {
        assert!(can_access_route(UserRole::User, "/destinos"));
        assert!(!can_access_route(UserRole::User, "/destinos/tulum"));
    }

    #[test]
    fn test_admin_guard_needs_dashboard_and_permission() {
        assert!(authorize_admin(UserRole::SuperAdmin, Permission::ManageUsers).is_ok());
        assert!(authorize_admin(UserRole::OfCounsel, Permission::ManageProperties).is_ok());
        assert!(matches!(
            authorize_admin(UserRole::OfCounsel, Permission::ManageUsers),
            Err(DomainError::Forbidden(_))
        ));
        // Management holds the permission but lives outside the admin panel.
        assert!(authorize_admin(UserRole::Management, Permission::ManageProperties).is_err());
        assert!(authorize_admin(UserRole::User, Permission::ViewReports).is_err());
    }

    #[test]
    fn test_describe_includes_label() {
        let info = describe(UserRole::VafiManager);
        assert_eq!(info.role_label, "Manager VA-FI");
        assert_eq!(info.dashboard.path, "/dashboard/vafi");
        assert!(info.permissions.contains(&Permission::ManageLoans));
    }
}
