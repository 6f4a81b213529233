use serde::{Deserialize, Serialize};

/// Org-scoped role. System roles seed on first migration; the REST
/// surface never creates custom roles, so this stays a closed enum
/// rather than a DB-backed catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum OrgRole {
    Owner,
    Editor,
    Viewer,
}

impl OrgRole {
    /// `owner`/`admin`-equivalent shortcut used by the authz engine to
    /// pass any "require any of" check.
    pub fn is_admin_shortcut(&self) -> bool {
        matches!(self, OrgRole::Owner)
    }

    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            OrgRole::Owner => &[Permission::Wildcard],
            OrgRole::Editor => &[
                Permission::OrgRead,
                Permission::TeamInvite,
                Permission::KeysWrite,
                Permission::LogsRead,
                Permission::KycDispatch,
            ],
            OrgRole::Viewer => &[Permission::OrgRead, Permission::LogsRead, Permission::KycDispatch],
        }
    }
}

/// Static permission catalog. `Wildcard` (`*`) matches any
/// `RequirePermission`/`RequireAnyPermission` check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    Wildcard,
    OrgRead,
    OrgUpdate,
    TeamInvite,
    KeysWrite,
    KeysRead,
    LogsRead,
    BillingRead,
    BillingWrite,
    KycDispatch,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Wildcard => "*",
            Permission::OrgRead => "org.read",
            Permission::OrgUpdate => "org.update",
            Permission::TeamInvite => "team.invite",
            Permission::KeysWrite => "keys.write",
            Permission::KeysRead => "keys.read",
            Permission::LogsRead => "logs.read",
            Permission::BillingRead => "billing.read",
            Permission::BillingWrite => "billing.write",
            Permission::KycDispatch => "kyc.dispatch",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "*" => Permission::Wildcard,
            "org.read" => Permission::OrgRead,
            "org.update" => Permission::OrgUpdate,
            "team.invite" => Permission::TeamInvite,
            "keys.write" => Permission::KeysWrite,
            "keys.read" => Permission::KeysRead,
            "logs.read" => Permission::LogsRead,
            "billing.read" => Permission::BillingRead,
            "billing.write" => Permission::BillingWrite,
            "kyc.dispatch" => Permission::KycDispatch,
            _ => return None,
        })
    }
}
