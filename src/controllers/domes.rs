use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::{guarded, AppJson, AppPath};
use crate::error::{AppError, AppResult};
use crate::models::NewPlanetariumDome;
use crate::policy::Resource;
use crate::views::DomeView;
use crate::AppState;

pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let router = Router::new()
        .route("/domes", get(list_domes).post(create_dome))
        .route("/domes/{id}", get(get_dome));
    guarded(router, state, Resource::Dome)
}

pub async fn list_domes(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<DomeView>>> {
    let domes = state.store.list_domes().await?;
    Ok(Json(domes.into_iter().map(DomeView::from).collect()))
}

pub async fn get_dome(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<DomeView>> {
    let dome = state
        .store
        .get_dome(id)
        .await?
        .ok_or_else(|| AppError::not_found("planetarium dome", id))?;
    Ok(Json(dome.into()))
}

pub async fn create_dome(
    State(state): State<Arc<AppState>>,
    AppJson(input): AppJson<NewPlanetariumDome>,
) -> AppResult<(StatusCode, Json<DomeView>)> {
    input.validate()?;
    let dome = state.store.create_dome(input).await?;
    info!(dome_id = dome.id, capacity = dome.capacity(), "planetarium dome created");
    Ok((StatusCode::CREATED, Json(dome.into())))
}
