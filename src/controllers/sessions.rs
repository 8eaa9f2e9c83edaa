use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::{guarded, AppJson, AppPath, AppQuery};
use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{NewShowSession, SessionFilter};
use crate::policy::Resource;
use crate::views::{SessionDetailView, SessionListView, SessionWriteView};
use crate::AppState;

pub const BAD_DATE: &str = "Date has wrong format. Use YYYY-MM-DD.";

pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let router = Router::new()
        .route("/show-sessions", get(list_sessions).post(create_session))
        .route("/show-sessions/{id}", get(get_session));
    guarded(router, state, Resource::Session)
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    pub theme: Option<String>,
    /// Calendar date, `YYYY-MM-DD`.
    pub show_time: Option<String>,
    pub title: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TryFrom<SessionQuery> for SessionFilter {
    type Error = AppError;

    fn try_from(query: SessionQuery) -> Result<Self, Self::Error> {
        let date = match non_blank(query.show_time) {
            Some(raw) => Some(
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map_err(|_| AppError::Validation(FieldErrors::single("show_time", BAD_DATE)))?,
            ),
            None => None,
        };
        Ok(SessionFilter {
            theme: non_blank(query.theme),
            date,
            title: non_blank(query.title),
        })
    }
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<SessionQuery>,
) -> AppResult<Json<Vec<SessionListView>>> {
    let filter = SessionFilter::try_from(query)?;
    debug!(?filter, "listing show sessions");
    let sessions = state.store.list_sessions(&filter).await?;
    Ok(Json(sessions.into_iter().map(SessionListView::from).collect()))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<SessionDetailView>> {
    let detail = state
        .store
        .get_session(id)
        .await?
        .ok_or_else(|| AppError::not_found("show session", id))?;
    Ok(Json(detail.into()))
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    AppJson(input): AppJson<NewShowSession>,
) -> AppResult<(StatusCode, Json<SessionWriteView>)> {
    let session = state.store.create_session(input).await?;
    info!(
        session_id = session.id,
        show_id = session.astronomy_show_id,
        dome_id = session.planetarium_dome_id,
        show_time = %session.show_time,
        "show session created"
    );
    Ok((StatusCode::CREATED, Json(session.into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_filters_are_ignored() {
        let query = SessionQuery {
            theme: Some("  ".into()),
            show_time: Some(String::new()),
            title: Some(" Mars ".into()),
        };
        let filter = SessionFilter::try_from(query).unwrap();
        assert_eq!(filter.theme, None);
        assert_eq!(filter.date, None);
        assert_eq!(filter.title.as_deref(), Some("Mars"));
    }

    #[test]
    fn malformed_date_is_a_field_error() {
        let query = SessionQuery { show_time: Some("2024-13-40".into()), ..Default::default() };
        let err = SessionFilter::try_from(query).unwrap_err();
        let fields = err.field_errors().unwrap();
        assert_eq!(fields.get("show_time"), Some(&[BAD_DATE.to_string()][..]));
    }
}
