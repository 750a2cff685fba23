use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Account role. One state machine, two storage collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Name of the table holding accounts of this role.
    pub fn table(&self) -> &'static str {
        match self {
            Role::User => "users",
            Role::Admin => "admins",
        }
    }

    /// The role whose table must NOT already hold a given email.
    pub fn other(&self) -> Role {
        match self {
            Role::User => Role::Admin,
            Role::Admin => Role::User,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability interface for the two account kinds.
///
/// The lifecycle state machine is shared; what differs is how credentials
/// are provisioned and which permissions a session carries. Member accounts
/// choose a password at signup; staff accounts receive a generated
/// temporary password when their email is verified.
pub trait AccountKind: Send + Sync + 'static {
    const ROLE: Role;

    /// Whether signup carries a caller-chosen password.
    const PASSWORD_AT_SIGNUP: bool;

    /// Permission snapshot embedded in session claims at login time.
    fn permissions(designation: Option<&str>) -> Vec<String>;
}

/// Library member.
pub struct UserKind;

impl AccountKind for UserKind {
    const ROLE: Role = Role::User;
    const PASSWORD_AT_SIGNUP: bool = true;

    fn permissions(_designation: Option<&str>) -> Vec<String> {
        vec!["catalog:read".to_string(), "loans:self".to_string()]
    }
}

/// Library staff member.
pub struct AdminKind;

impl AccountKind for AdminKind {
    const ROLE: Role = Role::Admin;
    const PASSWORD_AT_SIGNUP: bool = false;

    fn permissions(designation: Option<&str>) -> Vec<String> {
        let grants: &[&str] = match designation {
            Some("librarian") => &[
                "catalog:read",
                "catalog:write",
                "lending:manage",
                "members:read",
            ],
            Some("registrar") => &["catalog:read", "members:read", "members:write"],
            Some("director") => &[
                "catalog:read",
                "catalog:write",
                "lending:manage",
                "members:read",
                "members:write",
                "staff:manage",
            ],
            _ => &["catalog:read", "members:read"],
        };
        grants.iter().map(|g| g.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_point_at_their_tables() {
        assert_eq!(Role::User.table(), "users");
        assert_eq!(Role::Admin.table(), "admins");
        assert_eq!(Role::User.other(), Role::Admin);
        assert_eq!(Role::Admin.other(), Role::User);
    }

    #[test]
    fn member_permissions_ignore_designation() {
        assert_eq!(
            UserKind::permissions(Some("librarian")),
            UserKind::permissions(None)
        );
    }

    #[test]
    fn staff_permissions_follow_designation() {
        assert!(AdminKind::permissions(Some("librarian"))
            .contains(&"lending:manage".to_string()));
        assert!(!AdminKind::permissions(Some("registrar"))
            .contains(&"lending:manage".to_string()));
        assert!(AdminKind::permissions(Some("director")).contains(&"staff:manage".to_string()));
        assert_eq!(
            AdminKind::permissions(None),
            vec!["catalog:read".to_string(), "members:read".to_string()]
        );
    }
}
