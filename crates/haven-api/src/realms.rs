use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use haven_onboarding::NewRealm;
use haven_types::api::{CreateRealmRequest, CreateRealmResponse};
use haven_types::models::UserRole;

use crate::auth::{AppState, create_token, internal_error, new_member, run_blocking, validate_registration};

const DEFAULT_LANGUAGE: &str = "en";

/// Create an organization with its first owner. Onboarding seeds the
/// default channels, internal bots and welcome messages in the same
/// transaction.
pub async fn create_realm(
    State(state): State<AppState>,
    Json(req): Json<CreateRealmRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let name = req.name.trim();
    if name.is_empty() || name.len() > 60 {
        return Err(StatusCode::BAD_REQUEST);
    }
    validate_registration(&req.owner)?;

    let new_realm = NewRealm {
        name: name.to_string(),
        org_type: req.org_type,
        default_language: req.default_language.clone().unwrap_or_else(|| DEFAULT_LANGUAGE.into()),
        is_demo_organization: req.is_demo_organization,
    };
    let owner = new_member(&req.owner, UserRole::Owner)?;

    let db = state.clone();
    let (realm, user) = run_blocking(move || {
        db.onboarding
            .create_realm(&db.db, &new_realm, &owner)
            .map_err(internal_error("Realm creation failed"))
    })
    .await?;

    let token = create_token(&state.jwt_secret, &user)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateRealmResponse {
            realm_id: realm.id,
            user_id: user.id,
            token,
        }),
    ))
}
