use std::sync::Arc;

use anyhow::anyhow;
use axum::{Extension, Json, extract::State, extract::rejection::JsonRejection};
use tracing::info;
use uuid::Uuid;

use parlor_db::Database;
use parlor_types::api::{
    Claims, LoginRequest, LoginResponse, MeResponse, RegisterRequest, RegisterResponse,
};

use crate::credentials::CredentialStore;
use crate::error::ApiError;
use crate::tokens::TokenKeys;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub auth: AuthService,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, tokens: TokenKeys) -> Self {
        Self {
            auth: AuthService::new(CredentialStore::new(db.clone()), tokens),
            db,
        }
    }
}

/// Registration, login and token verification. Blocking: hashing and the
/// database both run on the caller's thread.
pub struct AuthService {
    credentials: CredentialStore,
    tokens: TokenKeys,
}

impl AuthService {
    pub fn new(credentials: CredentialStore, tokens: TokenKeys) -> Self {
        Self { credentials, tokens }
    }

    pub fn register(&self, username: &str, password: &str) -> Result<(), ApiError> {
        require_fields(username, password)?;

        // Early exit only; the unique index decides races
        if self.credentials.find_by_username(username)?.is_some() {
            return Err(ApiError::DuplicateUsername);
        }

        let user = self.credentials.create(username, password)?;
        info!("Registered {} ({})", user.username, user.id);
        Ok(())
    }

    /// Unknown user and wrong password both come back as
    /// `InvalidCredentials`.
    pub fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        require_fields(username, password)?;

        let Some(user) = self.credentials.find_by_username(username)? else {
            // Same Argon2 cost as a wrong password
            self.credentials.verify_unknown_user(password);
            return Err(ApiError::InvalidCredentials);
        };

        if !self.credentials.verify_password(&user, password) {
            return Err(ApiError::InvalidCredentials);
        }

        let user_id: Uuid = user
            .id
            .parse()
            .map_err(|e| anyhow!("Corrupt user id '{}': {}", user.id, e))?;
        let token = self.tokens.issue(user_id, &user.username)?;

        info!("{} ({}) logged in", user.username, user_id);
        Ok(LoginResponse {
            token,
            username: user.username,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        self.tokens.verify(token).map_err(|_| ApiError::Unauthorized)
    }
}

fn require_fields(username: &str, password: &str) -> Result<(), ApiError> {
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::Validation("Username and password required"));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let Json(req) = body?;

    // Argon2 and SQLite both block
    let st = state.clone();
    tokio::task::spawn_blocking(move || st.auth.register(&req.username, &req.password)).await??;

    Ok(Json(RegisterResponse {
        message: "User registered successfully".to_string(),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = body?;

    let st = state.clone();
    let response =
        tokio::task::spawn_blocking(move || st.auth.login(&req.username, &req.password)).await??;

    Ok(Json(response))
}

pub async fn me(Extension(claims): Extension<Claims>) -> Json<MeResponse> {
    Json(MeResponse {
        id: claims.sub,
        username: claims.username,
    })
}
