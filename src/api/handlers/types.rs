//! Request/response types for the HTTP API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::models::{ExtendedIdentity, Role};
use crate::directory::PersonEntry;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub academic_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subgroup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub english_group: Option<String>,
}

impl From<ExtendedIdentity> for UserResponse {
    fn from(identity: ExtendedIdentity) -> Self {
        Self {
            id: identity.id,
            username: identity.display_name,
            role: identity.role,
            academic_group: identity.academic_group,
            profile: identity.profile,
            subgroup: identity.subgroup,
            english_group: identity.english_group,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignInResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PersonResponse {
    pub id: String,
    pub username: String,
}

impl From<PersonEntry> for PersonResponse {
    fn from(entry: PersonEntry) -> Self {
        Self {
            id: entry.id,
            username: entry.display_name,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SearchResponse {
    pub students: Vec<PersonResponse>,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_response_omits_absent_attributes() {
        let identity = ExtendedIdentity {
            id: "t1010".to_string(),
            display_name: "Петров Петр".to_string(),
            role: Role::Teacher,
            academic_group: None,
            profile: None,
            subgroup: None,
            english_group: None,
        };
        let value = serde_json::to_value(UserResponse::from(identity)).expect("serialize");
        assert_eq!(value["role"], "teacher");
        assert!(value.get("academic_group").is_none());
    }

    #[test]
    fn user_response_carries_student_attributes() {
        let identity = ExtendedIdentity {
            id: "i24s0291".to_string(),
            display_name: "Коломацкий Иван".to_string(),
            role: Role::Student,
            academic_group: Some("ИТ24-11".to_string()),
            profile: Some("BE".to_string()),
            subgroup: None,
            english_group: None,
        };
        let value = serde_json::to_value(UserResponse::from(identity)).expect("serialize");
        assert_eq!(value["academic_group"], "ИТ24-11");
        assert_eq!(value["profile"], "BE");
    }

    #[test]
    fn sign_in_request_round_trips() {
        let request: SignInRequest =
            serde_json::from_value(serde_json::json!({"username": "i24s0291", "password": "x"}))
                .expect("deserialize");
        assert_eq!(request.username, "i24s0291");
        assert_eq!(request.password, "x");
    }
}
