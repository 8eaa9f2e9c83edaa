use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::{guarded, AppJson, AppPath, AppQuery};
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{Page, TicketRequest};
use crate::policy::Resource;
use crate::views::ReservationView;
use crate::AppState;

pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let router = Router::new()
        .route("/reservations", get(list_reservations).post(create_reservation))
        .route("/reservations/{id}", get(get_reservation));
    guarded(router, state, Resource::Reservation)
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct NewReservation {
    pub tickets: Vec<TicketRequest>,
}

pub async fn list_reservations(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> AppResult<Json<Vec<ReservationView>>> {
    let page = Page::new(query.page, query.page_size);
    let reservations = state.store.list_reservations(user.user_id, page).await?;
    Ok(Json(reservations.into_iter().map(ReservationView::from).collect()))
}

/// Someone else's reservation is indistinguishable from a missing one.
pub async fn get_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<ReservationView>> {
    let reservation = state
        .store
        .get_reservation(user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("reservation", id))?;
    Ok(Json(reservation.into()))
}

pub async fn create_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(input): AppJson<NewReservation>,
) -> AppResult<(StatusCode, Json<ReservationView>)> {
    let reservation = state
        .store
        .create_reservation(user.user_id, &input.tickets, Utc::now())
        .await?;

    info!(
        reservation_id = reservation.id,
        user_id = user.user_id,
        tickets = reservation.tickets.len(),
        "reservation created"
    );
    Ok((StatusCode::CREATED, Json(reservation.into())))
}
