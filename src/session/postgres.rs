//! Postgres-backed session store.
//!
//! Backed by the `refresh_sessions` table:
//!
//! ```sql
//! CREATE TABLE refresh_sessions (
//!     jti            TEXT PRIMARY KEY,
//!     userid         TEXT NOT NULL,
//!     username       TEXT NOT NULL,
//!     role           TEXT NOT NULL,
//!     academic_group TEXT,
//!     profile        TEXT,
//!     subgroup       TEXT,
//!     english_group  TEXT,
//!     created_at     TIMESTAMPTZ NOT NULL,
//!     expires_at     TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX refresh_sessions_userid_idx ON refresh_sessions (userid);
//! CREATE INDEX refresh_sessions_expires_at_idx ON refresh_sessions (expires_at);
//! ```
//!
//! `replace` runs as a transaction around `DELETE .. RETURNING` plus an
//! insert, so the delete decides the single winner under concurrent rotation
//! and a failed insert rolls the old session back instead of losing it.

use async_trait::async_trait;
use rand::Rng;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info_span, warn, Instrument};

use super::{RefreshSession, SessionStore, StoreError};
use crate::auth::models::{ExtendedIdentity, Role};

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn save(&self, session: &RefreshSession) -> Result<(), StoreError> {
        insert_session(&self.pool, session).await
    }

    async fn exists(&self, jti: &str) -> Result<bool, StoreError> {
        let query = r"
            SELECT 1
            FROM refresh_sessions
            WHERE jti = $1
              AND expires_at > NOW()
            LIMIT 1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(jti)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(row.is_some())
    }

    async fn revoke(&self, jti: &str) -> Result<(), StoreError> {
        let query = "DELETE FROM refresh_sessions WHERE jti = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(jti)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, StoreError> {
        let query = "DELETE FROM refresh_sessions WHERE userid = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(StoreError::unavailable)?;
        debug!(
            "revoked {} sessions for user {user_id}",
            result.rows_affected()
        );
        Ok(result.rows_affected())
    }

    async fn replace(&self, old_jti: &str, new: &RefreshSession) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::unavailable)?;

        let query = "DELETE FROM refresh_sessions WHERE jti = $1 RETURNING jti";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(old_jti)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .map_err(StoreError::unavailable)?;

        if row.is_none() {
            // Replay or already-rotated token; dropping the transaction
            // rolls back nothing of consequence.
            debug!("session {old_jti} already gone, nothing to replace");
            return Err(StoreError::SessionNotFound);
        }

        if let Err(err) = insert_session_tx(&mut tx, new).await {
            return match tx.rollback().await {
                Ok(()) => Err(err),
                Err(rollback_err) => {
                    // The old row is deleted and the rollback failed: the
                    // session may be gone for good.
                    error!(
                        "rollback failed after losing session {old_jti}: {rollback_err}"
                    );
                    Err(StoreError::SessionLost(Box::new(rollback_err)))
                }
            };
        }

        // A failed commit leaves the outcome unknown; treat the session as
        // lost so operators can tell this apart from plain unavailability.
        tx.commit()
            .await
            .map_err(|err| StoreError::SessionLost(Box::new(err)))
    }

    async fn read_identity_by_user_id(
        &self,
        user_id: &str,
    ) -> Result<ExtendedIdentity, StoreError> {
        let query = r"
            SELECT userid, username, role, academic_group, profile, subgroup, english_group
            FROM refresh_sessions
            WHERE userid = $1
              AND expires_at > NOW()
            ORDER BY created_at DESC
            LIMIT 1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(StoreError::unavailable)?;

        let Some(row) = row else {
            return Err(StoreError::SessionNotFound);
        };

        let role: String = row.get("role");
        let role = Role::parse(&role).ok_or_else(|| {
            StoreError::Unavailable(format!("unknown role {role:?} in session row").into())
        })?;

        Ok(ExtendedIdentity {
            id: row.get("userid"),
            display_name: row.get("username"),
            role,
            academic_group: row.get("academic_group"),
            profile: row.get("profile"),
            subgroup: row.get("subgroup"),
            english_group: row.get("english_group"),
        })
    }
}

async fn insert_session(pool: &PgPool, session: &RefreshSession) -> Result<(), StoreError> {
    let query = insert_query();
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    bind_session(sqlx::query(query), session)
        .execute(pool)
        .instrument(span)
        .await
        .map_err(classify_insert_error)?;
    Ok(())
}

async fn insert_session_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    session: &RefreshSession,
) -> Result<(), StoreError> {
    let query = insert_query();
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    bind_session(sqlx::query(query), session)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .map_err(classify_insert_error)?;
    Ok(())
}

const fn insert_query() -> &'static str {
    r"
        INSERT INTO refresh_sessions
            (jti, userid, username, role, academic_group, profile, subgroup,
             english_group, created_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
    "
}

fn bind_session<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    session: &'q RefreshSession,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(&session.jti)
        .bind(&session.user_id)
        .bind(&session.display_name)
        .bind(session.role.as_str())
        .bind(&session.academic_group)
        .bind(&session.profile)
        .bind(&session.subgroup)
        .bind(&session.english_group)
        .bind(session.created_at)
        .bind(session.expires_at)
}

fn classify_insert_error(err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        // A duplicate jti means a colliding token identifier; the store
        // refuses rather than overwrite a live session.
        warn!("refused to overwrite live session with duplicate jti");
    }
    StoreError::unavailable(err)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Periodically delete expired session rows.
///
/// Reads already filter on `expires_at`; the reaper keeps the table from
/// growing without bound. A small jitter keeps multiple instances from
/// sweeping in lockstep.
pub fn spawn_expiry_reaper(pool: PgPool, interval: Duration) {
    tokio::spawn(async move {
        loop {
            let jitter = rand::thread_rng().gen_range(0..=interval.as_millis() as u64 / 10 + 1);
            sleep(interval + Duration::from_millis(jitter)).await;

            let query = "DELETE FROM refresh_sessions WHERE expires_at <= NOW()";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DELETE",
                db.statement = query
            );
            match sqlx::query(query).execute(&pool).instrument(span).await {
                Ok(result) if result.rows_affected() > 0 => {
                    debug!("reaped {} expired refresh sessions", result.rows_affected());
                }
                Ok(_) => {}
                Err(err) => error!("failed to reap expired refresh sessions: {err}"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::RowNotFound;
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn insert_errors_classify_as_unavailable() {
        let err = classify_insert_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
