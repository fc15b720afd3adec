//! Role inference from group memberships and entry location.

use super::schema;
use crate::auth::models::Role;

/// One group membership, reduced to the signals role precedence cares about.
#[derive(Clone, Debug)]
pub(super) struct GroupSignal {
    pub(super) name: String,
    pub(super) is_admin_group: bool,
    pub(super) is_staff_group: bool,
    pub(super) is_academic_group_name: bool,
}

impl GroupSignal {
    pub(super) fn from_name(name: String) -> Self {
        Self {
            is_admin_group: name == schema::ADMIN_GROUP,
            is_staff_group: name == schema::STAFF_GROUP,
            is_academic_group_name: schema::is_academic_group_name(&name),
            name,
        }
    }
}

/// Role plus the academic group that granted student status, when any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct ResolvedRole {
    pub(super) role: Role,
    pub(super) academic_group: Option<String>,
}

/// Precedence over the whole membership set:
///
/// 1. admin group membership, irrespective of anything else
/// 2. staff group membership
/// 3. academic-group name, default subtree only → student
/// 4. staff subtree location, no group required
///
/// Anything else is unresolved and must be treated as an error.
pub(super) fn determine_role(
    groups: &[GroupSignal],
    staff_location: bool,
) -> Option<ResolvedRole> {
    if groups.iter().any(|group| group.is_admin_group) {
        return Some(ResolvedRole {
            role: Role::Admin,
            academic_group: None,
        });
    }
    if groups.iter().any(|group| group.is_staff_group) {
        return Some(ResolvedRole {
            role: Role::Teacher,
            academic_group: None,
        });
    }
    if !staff_location {
        if let Some(group) = groups.iter().find(|group| group.is_academic_group_name) {
            return Some(ResolvedRole {
                role: Role::Student,
                academic_group: Some(group.name.clone()),
            });
        }
    }
    if staff_location {
        return Some(ResolvedRole {
            role: Role::Teacher,
            academic_group: None,
        });
    }
    None
}
