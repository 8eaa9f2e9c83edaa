use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::{guarded, AppJson};
use crate::error::AppResult;
use crate::models::NewShowTheme;
use crate::policy::Resource;
use crate::views::ThemeView;
use crate::AppState;

pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let router = Router::new().route("/themes", get(list_themes).post(create_theme));
    guarded(router, state, Resource::Theme)
}

pub async fn list_themes(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<ThemeView>>> {
    let themes = state.store.list_themes().await?;
    Ok(Json(themes.into_iter().map(ThemeView::from).collect()))
}

pub async fn create_theme(
    State(state): State<Arc<AppState>>,
    AppJson(input): AppJson<NewShowTheme>,
) -> AppResult<(StatusCode, Json<ThemeView>)> {
    input.validate()?;
    let theme = state.store.create_theme(input).await?;
    info!(theme_id = theme.id, "show theme created");
    Ok((StatusCode::CREATED, Json(theme.into())))
}
