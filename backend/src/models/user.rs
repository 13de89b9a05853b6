//! User accounts, roles and the permission matrix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ParseEnumError, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    SuperAdmin,
    Management,
    Broker,
    BrokerElite,
    Notaria,
    OfCounsel,
    ServiceProvider,
    VafiManager,
    DaoMember,
    PropertyOwner,
    Staff,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageUsers,
    ManageProperties,
    ManageTransactions,
    ViewReports,
    ManageSystem,
    ApproveDocuments,
    ManageServices,
    ManageLoans,
    ManageDao,
    AccessAllDashboards,
}

/// Landing dashboard for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardRoute {
    pub path: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

impl UserRole {
    pub const ALL: [UserRole; 13] = [
        UserRole::Admin,
        UserRole::SuperAdmin,
        UserRole::Management,
        UserRole::Broker,
        UserRole::BrokerElite,
        UserRole::Notaria,
        UserRole::OfCounsel,
        UserRole::ServiceProvider,
        UserRole::VafiManager,
        UserRole::DaoMember,
        UserRole::PropertyOwner,
        UserRole::Staff,
        UserRole::User,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::SuperAdmin => "super_admin",
            UserRole::Management => "management",
            UserRole::Broker => "broker",
            UserRole::BrokerElite => "broker_elite",
            UserRole::Notaria => "notaria",
            UserRole::OfCounsel => "of_counsel",
            UserRole::ServiceProvider => "service_provider",
            UserRole::VafiManager => "vafi_manager",
            UserRole::DaoMember => "dao_member",
            UserRole::PropertyOwner => "property_owner",
            UserRole::Staff => "staff",
            UserRole::User => "user",
        }
    }

    /// Spanish display label.
    pub fn label(self) -> &'static str {
        match self {
            UserRole::Admin => "Administrador",
            UserRole::SuperAdmin => "Super Administrador",
            UserRole::Management => "Gestión",
            UserRole::Broker => "Intermediario",
            UserRole::BrokerElite => "Intermediario Elite",
            UserRole::Notaria => "Notaría",
            UserRole::OfCounsel => "Of Counsel",
            UserRole::ServiceProvider => "Proveedor de Servicios",
            UserRole::VafiManager => "Manager VA-FI",
            UserRole::DaoMember => "Miembro DAO",
            UserRole::PropertyOwner => "Propietario",
            UserRole::Staff => "Staff",
            UserRole::User => "Usuario",
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, UserRole::Admin | UserRole::SuperAdmin)
    }

    pub fn dashboard(self) -> DashboardRoute {
        let (path, label, description) = match self {
            UserRole::Admin => (
                "/dashboard/admin",
                "Panel Administrativo",
                "Gestión completa del sistema WEEK-CHAIN",
            ),
            UserRole::SuperAdmin => (
                "/dashboard/admin",
                "Panel Super Admin",
                "Acceso total al sistema y configuración",
            ),
            UserRole::Management => (
                "/management",
                "Panel de Gestión",
                "Administración de propiedades y servicios",
            ),
            UserRole::Broker => (
                "/dashboard/broker",
                "Panel de Intermediario",
                "Comisiones del 4% sobre referidos directos",
            ),
            UserRole::BrokerElite => (
                "/dashboard/broker",
                "Panel de Intermediario Elite",
                "Comisiones del 4% + beneficios exclusivos",
            ),
            UserRole::Notaria => (
                "/notaria",
                "Panel Notarial",
                "Revisión y aprobación de documentos legales",
            ),
            UserRole::OfCounsel => (
                "/dashboard/admin",
                "Panel Legal",
                "Asesoría legal y compliance",
            ),
            UserRole::ServiceProvider => (
                "/dashboard/service-provider",
                "Panel de Servicios",
                "Gestión de servicios y mantenimiento",
            ),
            UserRole::VafiManager => (
                "/dashboard/vafi",
                "Panel VA-FI",
                "Gestión de préstamos respaldados por NFT",
            ),
            UserRole::DaoMember => ("/dashboard/dao", "Panel DAO", "Gobernanza y votaciones"),
            UserRole::PropertyOwner => (
                "/dashboard/owner",
                "Panel de Propietario",
                "Gestión de propiedades tokenizadas",
            ),
            UserRole::Staff => ("/dashboard/member", "Panel de Staff", "Operaciones y soporte"),
            UserRole::User => (
                "/dashboard/member",
                "Mi Dashboard",
                "Gestión de certificados y reservaciones",
            ),
        };
        DashboardRoute {
            path,
            label,
            description,
        }
    }

    /// Permissions granted to the role.
    pub fn permissions(self) -> &'static [Permission] {
        use Permission::*;
        match self {
            UserRole::Admin | UserRole::SuperAdmin => &[
                ManageUsers,
                ManageProperties,
                ManageTransactions,
                ViewReports,
                ManageSystem,
                ApproveDocuments,
                ManageServices,
                ManageLoans,
                ManageDao,
                AccessAllDashboards,
            ],
            UserRole::Management => &[
                ManageProperties,
                ManageTransactions,
                ViewReports,
                ManageServices,
            ],
            UserRole::Broker | UserRole::BrokerElite => &[ManageTransactions, ViewReports],
            UserRole::Notaria => &[ViewReports, ApproveDocuments],
            UserRole::OfCounsel => &[
                ManageProperties,
                ManageTransactions,
                ViewReports,
                ApproveDocuments,
            ],
            UserRole::ServiceProvider => &[ManageServices],
            UserRole::VafiManager => &[ManageTransactions, ViewReports, ManageLoans],
            UserRole::DaoMember => &[ViewReports, ManageDao],
            UserRole::PropertyOwner => &[ManageProperties],
            UserRole::Staff => &[ViewReports],
            UserRole::User => &[],
        }
    }

    pub fn has_permission(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        UserRole::ALL
            .into_iter()
            .find(|role| role.as_str() == needle)
            .ok_or_else(|| ParseEnumError::new("role", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub wallet_address: Option<String>,
    pub referrals_this_month: u32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip_through_str() {
        for role in UserRole::ALL {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
        assert!("wizard".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_permission_matrix_samples() {
        assert!(UserRole::Admin.has_permission(Permission::ManageSystem));
        assert!(UserRole::Notaria.has_permission(Permission::ApproveDocuments));
        assert!(!UserRole::Notaria.has_permission(Permission::ManageUsers));
        assert!(UserRole::VafiManager.has_permission(Permission::ManageLoans));
        assert!(UserRole::User.permissions().is_empty());
    }

    #[test]
    fn test_brokers_share_dashboard() {
        assert_eq!(
            UserRole::Broker.dashboard().path,
            UserRole::BrokerElite.dashboard().path
        );
        assert_eq!(UserRole::OfCounsel.dashboard().path, "/dashboard/admin");
    }
}
