//! Directory naming convention: subtrees, bind DNs, filters, group names.
//!
//! Identifiers are split into exactly two subtrees by a prefix test: a
//! leading staff marker selects the teachers subtree, everything else the
//! default people subtree. Groups live under their own subtree and are
//! classified by their `description` attribute.

use ldap3::{dn_escape, ldap_escape};

/// Identifiers with this prefix belong to the staff subtree.
pub(super) const STAFF_MARKER: &str = "t";

/// Members of this group are administrators regardless of anything else.
pub(super) const ADMIN_GROUP: &str = "admin";

/// Members of this group are teaching staff.
pub(super) const STAFF_GROUP: &str = "teachers";

/// Academic groups are named with this prefix (e.g. "ИТ24-11").
pub(super) const ACADEMIC_GROUP_PREFIX: &str = "ИТ";

/// `description` value marking an academic group entry.
pub(super) const ACADEMIC_GROUP_DESCRIPTION: &str = "Академическая группа";

/// `description` value marking a profile entry.
pub(super) const PROFILE_DESCRIPTION: &str = "Профиль";

/// The fixed set of recognized profile codes.
pub(super) const PROFILE_CODES: [&str; 6] = ["BE", "FE", "PM", "CD", "GD", "SA"];

pub(super) fn is_staff_id(user_id: &str) -> bool {
    user_id.starts_with(STAFF_MARKER)
}

pub(super) fn default_people_base(base_dn: &str) -> String {
    format!("ou=people,{base_dn}")
}

pub(super) fn staff_people_base(base_dn: &str) -> String {
    format!("ou=people,ou=Teachers,{base_dn}")
}

/// Search base for the subtree the identifier belongs to.
pub(super) fn people_base(base_dn: &str, user_id: &str) -> String {
    if is_staff_id(user_id) {
        staff_people_base(base_dn)
    } else {
        default_people_base(base_dn)
    }
}

/// Bind DN derived deterministically from the identifier.
pub(super) fn bind_dn(base_dn: &str, user_id: &str) -> String {
    format!("uid={},{}", dn_escape(user_id), people_base(base_dn, user_id))
}

pub(super) fn groups_base(base_dn: &str) -> String {
    format!("ou=groups,{base_dn}")
}

pub(super) fn uid_filter(user_id: &str) -> String {
    format!("(uid={})", ldap_escape(user_id))
}

/// Groups referencing the principal either by member DN or by uid.
pub(super) fn membership_filter(user_dn: &str, user_id: &str) -> String {
    format!(
        "(&(|(objectClass=groupOfNames)(objectClass=posixGroup)(objectClass=group))\
         (|(member={})(memberUid={})))",
        ldap_escape(user_dn),
        ldap_escape(user_id)
    )
}

/// Substring search over non-staff person entries.
pub(super) fn student_search_filter(query: &str) -> String {
    let escaped = ldap_escape(query);
    format!(
        "(&(objectClass=person)(!(uid={STAFF_MARKER}*))(|(uid=*{escaped}*)(cn=*{escaped}*)))"
    )
}

/// Substring search over staff person entries.
pub(super) fn teacher_search_filter(query: &str) -> String {
    let escaped = ldap_escape(query);
    format!("(&(objectClass=person)(uid={STAFF_MARKER}*)(|(uid=*{escaped}*)(cn=*{escaped}*)))")
}

/// Extract the group common name from a `memberOf` DN, provided the group
/// lives under the groups subtree.
pub(super) fn group_cn_from_member_of(member_of: &str, base_dn: &str) -> Option<String> {
    let groups = groups_base(base_dn).to_lowercase();
    if !member_of.to_lowercase().contains(&groups) {
        return None;
    }
    member_of
        .split(',')
        .next()?
        .strip_prefix("cn=")
        .map(str::to_string)
}

/// Whether the entry's own DN sits in the staff subtree.
pub(super) fn is_staff_location(dn: &str) -> bool {
    dn.to_lowercase().contains("ou=teachers")
}

pub(super) fn is_academic_group_name(name: &str) -> bool {
    name.starts_with(ACADEMIC_GROUP_PREFIX)
}

pub(super) fn is_profile_code(name: &str) -> bool {
    PROFILE_CODES.contains(&name)
}
