use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{OrgType, Recipient};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the token issuers in
/// haven-api.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub realm_id: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Realms --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRealmRequest {
    pub name: String,
    pub org_type: OrgType,
    #[serde(default)]
    pub default_language: Option<String>,
    /// Demo organizations are scheduled for deletion after 30 days.
    #[serde(default)]
    pub is_demo_organization: bool,
    pub owner: RegisterRequest,
}

#[derive(Debug, Serialize)]
pub struct CreateRealmResponse {
    pub realm_id: Uuid,
    pub user_id: Uuid,
    pub token: String,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
    #[serde(default)]
    pub default_language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub realm_id: Uuid,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub full_name: String,
    pub token: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendDirectMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub sender_id: Uuid,
    pub sender_full_name: String,
    pub recipient: Recipient,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub reactions: Vec<ReactionGroup>,
}

// -- Reactions --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub emoji_name: String,
    pub emoji_code: String,
    pub count: usize,
    pub user_ids: Vec<Uuid>,
}
