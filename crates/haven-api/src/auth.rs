use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Json, extract::{Path, State}, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use tracing::{error, warn};
use uuid::Uuid;

use haven_db::Database;
use haven_onboarding::{AlreadyMember, NewMember, Onboarding, RealmNotFound};
use haven_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use haven_types::models::{User, UserRole};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub onboarding: Onboarding,
}

/// Join a spawn_blocking task, logging and flattening both failure layers.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, StatusCode>
where
    F: FnOnce() -> Result<T, StatusCode> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
}

pub(crate) fn internal_error(context: &str) -> impl FnOnce(anyhow::Error) -> StatusCode + '_ {
    move |e| {
        error!("{}: {:#}", context, e);
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Status for a failed registration: unknown realm and taken e-mail are
/// the caller's problem, anything else is ours.
pub(crate) fn registration_status(e: anyhow::Error) -> StatusCode {
    if e.is::<RealmNotFound>() {
        StatusCode::NOT_FOUND
    } else if let Some(conflict) = e.downcast_ref::<AlreadyMember>() {
        warn!("Duplicate registration: {}", conflict);
        StatusCode::CONFLICT
    } else {
        internal_error("Registration failed")(e)
    }
}

/// Shape checks shared by realm creation and registration.
pub(crate) fn validate_registration(req: &RegisterRequest) -> Result<(), StatusCode> {
    let email = req.email.trim();
    if email.len() > 254 || !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.full_name.trim().is_empty() || req.full_name.len() > 100 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(())
}

/// Hash the password with Argon2id and build the member to create.
pub(crate) fn new_member(req: &RegisterRequest, role: UserRole) -> Result<NewMember, StatusCode> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .to_string();

    Ok(NewMember {
        email: req.email.trim().to_lowercase(),
        full_name: req.full_name.trim().to_string(),
        password_hash,
        role,
        default_language: req.default_language.clone(),
    })
}

pub async fn register(
    State(state): State<AppState>,
    Path(realm_id): Path<Uuid>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    validate_registration(&req)?;
    let member = new_member(&req, UserRole::Member)?;

    // Realm and duplicate checks run inside the registration transaction
    let db = state.clone();
    let user = run_blocking(move || {
        db.onboarding
            .register_user(&db.db, realm_id, &member)
            .map_err(registration_status)
    })
    .await?;

    let token = create_token(&state.jwt_secret, &user)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let realm_id = req.realm_id;
    let email = req.email.trim().to_lowercase();
    let (user, password) = run_blocking(move || {
        db.db
            .get_login(realm_id, &email)
            .map_err(internal_error("Login lookup failed"))?
            .ok_or(StatusCode::UNAUTHORIZED)
    })
    .await?;

    // Internal bots have no password and cannot log in
    let Some(password) = password else {
        warn!("Login attempt for passwordless account {}", user.email);
        return Err(StatusCode::UNAUTHORIZED);
    };

    // Verify password
    let parsed_hash =
        PasswordHash::new(&password).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let token = create_token(&state.jwt_secret, &user)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        full_name: user.full_name,
        token,
    }))
}

pub(crate) fn create_token(secret: &str, user: &User) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        realm_id: user.realm_id,
        email: user.email.clone(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
