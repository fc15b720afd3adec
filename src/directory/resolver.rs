//! LDAP adapter for identity resolution.

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, Scope, SearchEntry, SearchOptions, SearchResult};
use std::time::Duration;
use tracing::{debug, error, warn};

use super::role::{self, GroupSignal};
use super::schema;
use crate::auth::error::AuthError;
use crate::auth::models::{GroupAttributes, Identity};

const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Cap on internal search results, matching the directory's own limits.
const SEARCH_SIZE_LIMIT: i32 = 50;

/// Minimal person entry returned by the internal search API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersonEntry {
    pub id: String,
    pub display_name: String,
}

/// Identity resolution contract consumed by the orchestrator.
#[async_trait]
pub trait DirectoryResolver: Send + Sync {
    /// Verify credentials by binding as the principal.
    async fn authenticate(&self, user_id: &str, password: &str) -> Result<(), AuthError>;

    /// Resolve the canonical identity: id, display name, role.
    async fn resolve(&self, user_id: &str, password: &str) -> Result<Identity, AuthError>;

    /// Resolve academic group attributes for non-staff principals.
    async fn resolve_groups(
        &self,
        user_id: &str,
        password: &str,
    ) -> Result<GroupAttributes, AuthError>;

    /// Substring search over student entries, for the internal API.
    async fn search_students(&self, query: &str) -> Result<Vec<PersonEntry>, AuthError>;

    /// Substring search over staff entries, for the internal API.
    async fn search_teachers(&self, query: &str) -> Result<Vec<PersonEntry>, AuthError>;
}

/// Directory endpoint configuration.
#[derive(Clone, Debug)]
pub struct DirectoryConfig {
    url: String,
    base_dn: String,
    op_timeout: Duration,
}

impl DirectoryConfig {
    #[must_use]
    pub fn new(url: String, base_dn: String) -> Self {
        Self {
            url,
            base_dn,
            op_timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn with_op_timeout_seconds(mut self, seconds: u64) -> Self {
        self.op_timeout = Duration::from_secs(seconds);
        self
    }
}

/// [`DirectoryResolver`] over a live LDAP server.
pub struct LdapDirectory {
    config: DirectoryConfig,
}

impl LdapDirectory {
    #[must_use]
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<Ldap, AuthError> {
        let (conn, ldap) = LdapConnAsync::new(self.config.url.as_str())
            .await
            .map_err(unavailable)?;
        ldap3::drive!(conn);
        Ok(ldap)
    }

    /// Bind as the principal, returning the bind DN on success.
    async fn bind_as(
        &self,
        ldap: &mut Ldap,
        user_id: &str,
        password: &str,
    ) -> Result<String, AuthError> {
        // An empty password would be an anonymous bind, which always
        // succeeds; it must never count as authentication.
        if password.is_empty() {
            return Err(AuthError::InputValidation);
        }

        let dn = schema::bind_dn(&self.config.base_dn, user_id);
        let result = ldap
            .with_timeout(self.config.op_timeout)
            .simple_bind(&dn, password)
            .await
            .map_err(unavailable)?;

        match result.rc {
            0 => Ok(dn),
            RC_INVALID_CREDENTIALS | RC_NO_SUCH_OBJECT => {
                warn!("directory bind failed for {user_id}");
                Err(AuthError::AuthFailure)
            }
            rc => Err(AuthError::DirectoryUnavailable(
                format!("bind failed with result code {rc}: {}", result.text).into(),
            )),
        }
    }

    async fn search_people(
        &self,
        base: String,
        filter: String,
    ) -> Result<Vec<PersonEntry>, AuthError> {
        let mut ldap = self.connect().await?;
        let SearchResult(entries, result) = ldap
            .with_search_options(SearchOptions::new().sizelimit(SEARCH_SIZE_LIMIT))
            .with_timeout(self.config.op_timeout)
            .search(&base, Scope::Subtree, &filter, vec!["uid", "cn"])
            .await
            .map_err(unavailable)?;
        let _ = ldap.unbind().await;

        // A truncated result set is fine for a substring search.
        if result.rc != 0 && result.rc != RC_SIZE_LIMIT_EXCEEDED {
            return Err(AuthError::DirectoryUnavailable(
                format!("search failed with result code {}: {}", result.rc, result.text).into(),
            ));
        }

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .filter_map(|entry| {
                let id = entry.attrs.get("uid")?.first()?.clone();
                let display_name = entry.attrs.get("cn")?.first()?.clone();
                if id.is_empty() || display_name.is_empty() {
                    return None;
                }
                Some(PersonEntry { id, display_name })
            })
            .collect())
    }
}

#[async_trait]
impl DirectoryResolver for LdapDirectory {
    async fn authenticate(&self, user_id: &str, password: &str) -> Result<(), AuthError> {
        let mut ldap = self.connect().await?;
        let bound = self.bind_as(&mut ldap, user_id, password).await;
        let _ = ldap.unbind().await;
        bound.map(|_| ())
    }

    async fn resolve(&self, user_id: &str, password: &str) -> Result<Identity, AuthError> {
        let mut ldap = self.connect().await?;
        let bound = self.resolve_with(&mut ldap, user_id, password).await;
        let _ = ldap.unbind().await;
        bound
    }

    async fn resolve_groups(
        &self,
        user_id: &str,
        password: &str,
    ) -> Result<GroupAttributes, AuthError> {
        let mut ldap = self.connect().await?;
        let resolved = self.resolve_groups_with(&mut ldap, user_id, password).await;
        let _ = ldap.unbind().await;
        resolved
    }

    async fn search_students(&self, query: &str) -> Result<Vec<PersonEntry>, AuthError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let entries = self
            .search_people(
                schema::default_people_base(&self.config.base_dn),
                schema::student_search_filter(query),
            )
            .await?;
        Ok(entries
            .into_iter()
            .filter(|person| !schema::is_staff_id(&person.id))
            .collect())
    }

    async fn search_teachers(&self, query: &str) -> Result<Vec<PersonEntry>, AuthError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.search_people(
            schema::staff_people_base(&self.config.base_dn),
            schema::teacher_search_filter(query),
        )
        .await
    }
}

impl LdapDirectory {
    async fn resolve_with(
        &self,
        ldap: &mut Ldap,
        user_id: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        self.bind_as(ldap, user_id, password).await?;

        let base = schema::people_base(&self.config.base_dn, user_id);
        let filter = schema::uid_filter(user_id);
        let (entries, _) = ldap
            .with_timeout(self.config.op_timeout)
            .search(&base, Scope::Subtree, &filter, vec!["uid", "cn", "memberOf"])
            .await
            .map_err(unavailable)?
            .success()
            .map_err(unavailable)?;

        let mut entries = entries;
        if entries.is_empty() {
            warn!("user {user_id} not found in directory");
            return Err(AuthError::NotFound);
        }
        if entries.len() > 1 {
            error!(
                "multiple directory entries ({}) found for user {user_id}",
                entries.len()
            );
            return Err(AuthError::MultipleMatches);
        }
        let entry = SearchEntry::construct(entries.remove(0));

        let id = require_attr(&entry, "uid")?;
        let display_name = require_attr(&entry, "cn")?;

        let staff_location = schema::is_staff_location(&entry.dn);
        let signals: Vec<GroupSignal> = entry
            .attrs
            .get("memberOf")
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|member_of| {
                schema::group_cn_from_member_of(member_of, &self.config.base_dn)
            })
            .map(GroupSignal::from_name)
            .collect();

        let resolved = role::determine_role(&signals, staff_location).ok_or_else(|| {
            warn!("role not determined from groups and DN for user {user_id}");
            AuthError::RoleUnresolved
        })?;
        debug!("user {user_id} role determined as {}", resolved.role.as_str());

        Ok(Identity {
            id,
            display_name,
            role: resolved.role,
        })
    }

    async fn resolve_groups_with(
        &self,
        ldap: &mut Ldap,
        user_id: &str,
        password: &str,
    ) -> Result<GroupAttributes, AuthError> {
        let user_dn = self.bind_as(ldap, user_id, password).await?;

        let base = schema::groups_base(&self.config.base_dn);
        let filter = schema::membership_filter(&user_dn, user_id);
        let (entries, _) = ldap
            .with_timeout(self.config.op_timeout)
            .search(&base, Scope::Subtree, &filter, vec!["cn", "description"])
            .await
            .map_err(unavailable)?
            .success()
            .map_err(unavailable)?;

        let mut attrs = GroupAttributes::default();
        for entry in entries.into_iter().map(SearchEntry::construct) {
            let Some(cn) = entry.attrs.get("cn").and_then(|values| values.first()) else {
                continue;
            };
            let description = entry
                .attrs
                .get("description")
                .and_then(|values| values.first())
                .map_or("", String::as_str);

            if description == schema::ACADEMIC_GROUP_DESCRIPTION
                && schema::is_academic_group_name(cn)
            {
                debug!("found academic group {cn} for user {user_id}");
                attrs.academic_group = Some(cn.clone());
            }
            if description == schema::PROFILE_DESCRIPTION && schema::is_profile_code(cn) {
                debug!("found profile {cn} for user {user_id}");
                attrs.profile = Some(cn.clone());
            }
        }

        if !schema::is_staff_id(user_id) && attrs.academic_group.is_none() {
            warn!("no academic group found for student {user_id}");
        }

        Ok(attrs)
    }
}

fn require_attr(entry: &SearchEntry, name: &'static str) -> Result<String, AuthError> {
    entry
        .attrs
        .get(name)
        .and_then(|values| values.first())
        .filter(|value| !value.is_empty())
        .cloned()
        .ok_or(AuthError::MissingAttribute(name))
}

fn unavailable(err: ldap3::LdapError) -> AuthError {
    AuthError::DirectoryUnavailable(Box::new(err))
}
