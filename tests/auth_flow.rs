//! End-to-end token lifecycle over the public API, with an in-memory
//! session store and a scripted directory.

use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Arc;

use aula::auth::{
    AuthError, AuthService, ExtendedIdentity, GroupAttributes, Identity, Role, TokenConfig,
    TokenManager,
};
use aula::directory::{DirectoryResolver, PersonEntry};
use aula::session::{InMemorySessionStore, SessionStore};

/// Directory with two fixed principals: one student, one teacher.
struct CampusDirectory;

const STUDENT_ID: &str = "i24s0291";
const STUDENT_PASSWORD: &str = "student-password";
const TEACHER_ID: &str = "t1010";
const TEACHER_PASSWORD: &str = "teacher-password";

impl CampusDirectory {
    fn check(&self, user_id: &str, password: &str) -> Result<(), AuthError> {
        match (user_id, password) {
            (STUDENT_ID, STUDENT_PASSWORD) | (TEACHER_ID, TEACHER_PASSWORD) => Ok(()),
            _ => Err(AuthError::AuthFailure),
        }
    }
}

#[async_trait]
impl DirectoryResolver for CampusDirectory {
    async fn authenticate(&self, user_id: &str, password: &str) -> Result<(), AuthError> {
        self.check(user_id, password)
    }

    async fn resolve(&self, user_id: &str, password: &str) -> Result<Identity, AuthError> {
        self.check(user_id, password)?;
        Ok(match user_id {
            STUDENT_ID => Identity {
                id: STUDENT_ID.to_string(),
                display_name: "Коломацкий Иван".to_string(),
                role: Role::Student,
            },
            _ => Identity {
                id: TEACHER_ID.to_string(),
                display_name: "Петров Петр".to_string(),
                role: Role::Teacher,
            },
        })
    }

    async fn resolve_groups(
        &self,
        user_id: &str,
        password: &str,
    ) -> Result<GroupAttributes, AuthError> {
        self.check(user_id, password)?;
        Ok(GroupAttributes {
            academic_group: Some("ИТ24-11".to_string()),
            profile: Some("BE".to_string()),
            ..GroupAttributes::default()
        })
    }

    async fn search_students(&self, _query: &str) -> Result<Vec<PersonEntry>, AuthError> {
        Ok(vec![PersonEntry {
            id: STUDENT_ID.to_string(),
            display_name: "Коломацкий Иван".to_string(),
        }])
    }

    async fn search_teachers(&self, _query: &str) -> Result<Vec<PersonEntry>, AuthError> {
        Ok(vec![PersonEntry {
            id: TEACHER_ID.to_string(),
            display_name: "Петров Петр".to_string(),
        }])
    }
}

fn service() -> (AuthService, Arc<InMemorySessionStore>) {
    let sessions = Arc::new(InMemorySessionStore::new());
    let tokens = TokenManager::new(&TokenConfig::new(SecretString::from(
        "integration-signing-key".to_string(),
    )));
    let service = AuthService::new(tokens, Arc::new(CampusDirectory), sessions.clone());
    (service, sessions)
}

#[tokio::test]
async fn full_token_lifecycle() {
    let (service, _) = service();

    // Sign in and check the cached identity round trip.
    let (pair, identity) = service
        .sign_in(STUDENT_ID, STUDENT_PASSWORD)
        .await
        .expect("sign in");
    assert_eq!(identity.role, Role::Student);
    assert_eq!(identity.academic_group.as_deref(), Some("ИТ24-11"));
    assert_eq!(identity.profile.as_deref(), Some("BE"));

    let cached: ExtendedIdentity = service
        .validate_access_token(&pair.access_token)
        .await
        .expect("validate access token");
    assert_eq!(cached, identity);

    // Rotate, replay the old token, rotate again.
    let rotated = service.refresh(&pair.refresh_token).await.expect("rotate");
    assert!(matches!(
        service.refresh(&pair.refresh_token).await,
        Err(AuthError::SessionNotFound)
    ));
    let rotated_again = service
        .refresh(&rotated.refresh_token)
        .await
        .expect("rotate again");

    // Access-only renewal leaves the refresh session usable.
    let (access, _) = service
        .get_access_token(&rotated_again.refresh_token)
        .await
        .expect("renew access token");
    service
        .validate_access_token(&access)
        .await
        .expect("validate renewed access token");

    // Sign out ends the chain.
    service
        .sign_out(&rotated_again.refresh_token)
        .await
        .expect("sign out");
    assert!(matches!(
        service.refresh(&rotated_again.refresh_token).await,
        Err(AuthError::SessionNotFound)
    ));
    assert!(matches!(
        service.get_access_token(&rotated_again.refresh_token).await,
        Err(AuthError::SessionNotFound)
    ));
}

#[tokio::test]
async fn teacher_sign_in_carries_no_academic_attributes() {
    let (service, _) = service();
    let (_, identity) = service
        .sign_in(TEACHER_ID, TEACHER_PASSWORD)
        .await
        .expect("sign in");
    assert_eq!(identity.role, Role::Teacher);
    assert_eq!(identity.academic_group, None);
    assert_eq!(identity.profile, None);
}

#[tokio::test]
async fn wrong_password_is_indistinguishable_from_unknown_user() {
    let (service, _) = service();

    let wrong_password = service.sign_in(STUDENT_ID, "wrong").await;
    let unknown_user = service.sign_in("i99s9999", "whatever").await;

    for result in [wrong_password, unknown_user] {
        match result {
            Err(err) => assert_eq!(err.public_message(), "authentication failed"),
            Ok(_) => panic!("sign-in must fail"),
        }
    }
}

#[tokio::test]
async fn revoke_all_for_user_cuts_every_refresh_chain() {
    let (service, sessions) = service();

    let (laptop, _) = service
        .sign_in(STUDENT_ID, STUDENT_PASSWORD)
        .await
        .expect("sign in on laptop");
    let (phone, _) = service
        .sign_in(STUDENT_ID, STUDENT_PASSWORD)
        .await
        .expect("sign in on phone");

    sessions
        .revoke_all_for_user(STUDENT_ID)
        .await
        .expect("revoke all");

    for pair in [laptop, phone] {
        assert!(matches!(
            service.refresh(&pair.refresh_token).await,
            Err(AuthError::SessionNotFound)
        ));
    }
}

#[tokio::test]
async fn concurrent_rotations_of_one_token_have_one_winner() {
    let (service, _) = service();
    let service = Arc::new(service);

    let (pair, _) = service
        .sign_in(STUDENT_ID, STUDENT_PASSWORD)
        .await
        .expect("sign in");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        let token = pair.refresh_token.clone();
        handles.push(tokio::spawn(async move { service.refresh(&token).await }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => winners += 1,
            Err(AuthError::SessionNotFound) => {}
            Err(err) => panic!("unexpected refresh error: {err}"),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn tokens_from_another_service_are_rejected() {
    let (service, _) = service();
    service
        .sign_in(STUDENT_ID, STUDENT_PASSWORD)
        .await
        .expect("sign in");

    let foreign = TokenManager::new(&TokenConfig::new(SecretString::from(
        "some-other-signing-key".to_string(),
    )));
    let forged = foreign.issue_refresh(STUDENT_ID).expect("forge refresh");

    assert!(matches!(
        service.refresh(&forged).await,
        Err(AuthError::TokenSignatureInvalid)
    ));
}
