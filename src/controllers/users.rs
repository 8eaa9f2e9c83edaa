use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use super::{guarded, AppJson};
use crate::error::{AppError, AppResult, FieldErrors};
use crate::middleware::AuthUser;
use crate::models::{normalize_email, NewUser, UserChanges};
use crate::policy::Resource;
use crate::views::UserView;
use crate::AppState;

pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let register = guarded(
        Router::new().route("/users/register", post(register)),
        state,
        Resource::Registration,
    );
    let token = guarded(
        Router::new().route("/users/token", post(issue_token)),
        state,
        Resource::Token,
    );
    let profile = guarded(
        Router::new().route("/users/me", get(me).put(replace_me).patch(update_me)),
        state,
        Resource::Profile,
    );
    register.merge(token).merge(profile)
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "Ensure this field has at least 8 characters."))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub id: i64,
    pub email: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(mut input): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisteredUser>)> {
    input.email = normalize_email(&input.email);
    input.validate()?;

    let user = state
        .store
        .create_user(NewUser {
            email: input.email,
            password_hash: state.passwords.hash(&input.password)?,
            is_staff: false,
        })
        .await?;

    info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(RegisteredUser { id: user.id, email: user.email })))
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    AppJson(input): AppJson<TokenRequest>,
) -> AppResult<Json<TokenResponse>> {
    let user = state
        .store
        .find_user_by_email(&normalize_email(&input.email))
        .await?
        .filter(|user| state.passwords.verify(&input.password, &user.password_hash));

    let Some(user) = user else {
        warn!("token request with invalid credentials");
        return Err(AppError::Unauthorized(
            "No active account found with the given credentials".into(),
        ));
    };

    Ok(Json(TokenResponse {
        access: state.tokens.issue(user.id, user.is_staff)?,
        token_type: "Bearer",
        expires_in: state.tokens.lifetime_secs(),
    }))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<UserView>> {
    let account = state
        .store
        .find_user(user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user", user.user_id))?;
    Ok(Json(account.into()))
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "Ensure this field has at least 8 characters."))]
    pub password: Option<String>,
}

pub async fn replace_me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(input): AppJson<ProfileUpdate>,
) -> AppResult<Json<UserView>> {
    if input.email.is_none() {
        return Err(AppError::Validation(FieldErrors::single(
            "email",
            "This field is required.",
        )));
    }
    apply_profile_update(&state, &user, input).await
}

pub async fn update_me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(input): AppJson<ProfileUpdate>,
) -> AppResult<Json<UserView>> {
    apply_profile_update(&state, &user, input).await
}

async fn apply_profile_update(
    state: &AppState,
    user: &AuthUser,
    mut input: ProfileUpdate,
) -> AppResult<Json<UserView>> {
    input.email = input.email.as_deref().map(normalize_email);
    input.validate()?;

    let changes = UserChanges {
        password_hash: input
            .password
            .as_deref()
            .map(|password| state.passwords.hash(password))
            .transpose()?,
        email: input.email,
    };
    let password_changed = changes.password_hash.is_some();

    let account = state.store.update_user(user.user_id, changes).await?;
    info!(user_id = account.id, password_changed, "profile updated");
    Ok(Json(account.into()))
}
