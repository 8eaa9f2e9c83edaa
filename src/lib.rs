pub mod auth;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod services;
pub mod store;
pub mod views;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::auth::{PasswordHasher, TokenService};
use crate::error::AppResult;
use crate::models::{normalize_email, NewUser, UserChanges};
use crate::store::PlanetariumStore;

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PlanetariumStore>,
    pub tokens: TokenService,
    pub passwords: PasswordHasher,
    pub config: config::Config,
}

impl AppState {
    pub fn new(config: config::Config, store: Arc<dyn PlanetariumStore>) -> Arc<Self> {
        Arc::new(Self {
            tokens: TokenService::new(&config.jwt),
            passwords: PasswordHasher::new(&config.auth),
            store,
            config,
        })
    }

    /// Creates the configured staff account; an existing staff account gets its
    /// password refreshed, an existing non-staff account is left alone.
    pub async fn ensure_staff_account(&self, email: &str, password: &str) -> AppResult<()> {
        let email = normalize_email(email);
        let password_hash = self.passwords.hash(password)?;

        match self.store.find_user_by_email(&email).await? {
            Some(user) if user.is_staff => {
                self.store
                    .update_user(user.id, UserChanges { email: None, password_hash: Some(password_hash) })
                    .await?;
                info!(user_id = user.id, "staff account password refreshed");
            }
            Some(user) => {
                tracing::warn!(user_id = user.id, "existing account is not staff, leaving it untouched");
            }
            None => {
                let user = self
                    .store
                    .create_user(NewUser { email, password_hash, is_staff: true })
                    .await?;
                info!(user_id = user.id, "staff account created");
            }
        }
        Ok(())
    }
}

/// Full HTTP surface: banner, health check and the JSON API under `/api`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Planetarium API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes(state.clone()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
