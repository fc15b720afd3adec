//! Identity and token types shared across the crate.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Institutional role, inferred from directory group membership.
///
/// There is no "unknown" variant on purpose: an unresolvable role is a
/// resolution error, never a value that escapes the resolver.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "student" => Some(Self::Student),
            "teacher" => Some(Self::Teacher),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Staff roles skip academic group resolution at sign-in.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Teacher | Self::Admin)
    }
}

/// Canonical identity resolved from the directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub role: Role,
}

/// Academic attributes resolved from the groups subtree.
///
/// `subgroup` and `english_group` are carried through the session snapshot
/// but are not derived from the directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupAttributes {
    pub academic_group: Option<String>,
    pub profile: Option<String>,
    pub subgroup: Option<String>,
    pub english_group: Option<String>,
}

/// Identity plus academic attributes, as cached in the session snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExtendedIdentity {
    pub id: String,
    pub display_name: String,
    pub role: Role,
    pub academic_group: Option<String>,
    pub profile: Option<String>,
    pub subgroup: Option<String>,
    pub english_group: Option<String>,
}

impl ExtendedIdentity {
    #[must_use]
    pub fn new(identity: Identity, groups: GroupAttributes) -> Self {
        Self {
            id: identity.id,
            display_name: identity.display_name,
            role: identity.role,
            academic_group: groups.academic_group,
            profile: groups.profile,
            subgroup: groups.subgroup,
            english_group: groups.english_group,
        }
    }
}

/// Signed access/refresh token pair issued at sign-in and rotation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Claims carried by an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: String,
    pub username: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token. `jti` keys the refresh session.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub user_id: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::Student, Role::Teacher, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("superuser"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(Role::Admin).expect("serialize role"),
            serde_json::json!("admin")
        );
    }

    #[test]
    fn staff_roles_skip_group_resolution() {
        assert!(Role::Teacher.is_staff());
        assert!(Role::Admin.is_staff());
        assert!(!Role::Student.is_staff());
    }

    #[test]
    fn extended_identity_merges_group_attributes() {
        let identity = Identity {
            id: "i24s0291".to_string(),
            display_name: "Коломацкий Иван".to_string(),
            role: Role::Student,
        };
        let groups = GroupAttributes {
            academic_group: Some("ИТ24-11".to_string()),
            profile: Some("BE".to_string()),
            ..GroupAttributes::default()
        };
        let extended = ExtendedIdentity::new(identity, groups);
        assert_eq!(extended.id, "i24s0291");
        assert_eq!(extended.role, Role::Student);
        assert_eq!(extended.academic_group.as_deref(), Some("ИТ24-11"));
        assert_eq!(extended.profile.as_deref(), Some("BE"));
        assert_eq!(extended.subgroup, None);
    }
}
