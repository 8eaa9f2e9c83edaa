use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::{guarded, AppJson, AppPath};
use crate::error::{AppError, AppResult};
use crate::models::NewAstronomyShow;
use crate::policy::{show_shape, Operation, Resource};
use crate::views::ShowView;
use crate::AppState;

pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let router = Router::new()
        .route("/astronomy-shows", get(list_shows).post(create_show))
        .route("/astronomy-shows/{id}", get(get_show));
    guarded(router, state, Resource::Show)
}

pub async fn list_shows(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<ShowView>>> {
    let shape = show_shape(Operation::List);
    let shows = state.store.list_shows().await?;
    Ok(Json(
        shows.into_iter().map(|show| ShowView::project(show, shape)).collect(),
    ))
}

pub async fn get_show(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<ShowView>> {
    let show = state
        .store
        .get_show(id)
        .await?
        .ok_or_else(|| AppError::not_found("astronomy show", id))?;
    let shape = show_shape(Operation::Retrieve);
    Ok(Json(ShowView::project(show, shape)))
}

pub async fn create_show(
    State(state): State<Arc<AppState>>,
    AppJson(input): AppJson<NewAstronomyShow>,
) -> AppResult<(StatusCode, Json<ShowView>)> {
    input.validate()?;
    let show = state.store.create_show(input).await?;
    info!(show_id = show.id, title = %show.title, "astronomy show created");

    let shape = show_shape(Operation::Create);
    Ok((StatusCode::CREATED, Json(ShowView::project(show, shape))))
}
