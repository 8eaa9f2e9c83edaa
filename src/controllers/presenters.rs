use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::{guarded, AppJson};
use crate::error::AppResult;
use crate::models::NewPresenter;
use crate::policy::Resource;
use crate::views::PresenterView;
use crate::AppState;

pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let router = Router::new().route("/presenters", get(list_presenters).post(create_presenter));
    guarded(router, state, Resource::Presenter)
}

pub async fn list_presenters(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<PresenterView>>> {
    let presenters = state.store.list_presenters().await?;
    Ok(Json(presenters.into_iter().map(PresenterView::from).collect()))
}

pub async fn create_presenter(
    State(state): State<Arc<AppState>>,
    AppJson(input): AppJson<NewPresenter>,
) -> AppResult<(StatusCode, Json<PresenterView>)> {
    input.validate()?;
    let presenter = state.store.create_presenter(input).await?;
    info!(presenter_id = presenter.id, "presenter created");
    Ok((StatusCode::CREATED, Json(presenter.into())))
}
