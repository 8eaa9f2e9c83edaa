// One lock over the whole data set: a reservation is validated and written
// with no other writer interleaved.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::PlanetariumStore;
use crate::error::{AppError, AppResult, FieldErrors, EMAIL_TAKEN};
use crate::models::{
    AstronomyShow, NewAstronomyShow, NewPlanetariumDome, NewPresenter, NewShowSession,
    NewShowTheme, NewUser, Page, PlanetariumDome, Presenter, Reservation, Seat, SessionDetail,
    SessionFilter, SessionSummary, ShowSession, ShowTheme, Ticket, TicketRequest, User,
    UserChanges,
};
use crate::services::booking::{self, SessionSlot};

#[derive(Debug, Clone)]
struct ShowRow {
    id: i64,
    title: String,
    description: String,
    presenter_id: Option<i64>,
    theme_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
struct ReservationRow {
    id: i64,
    user_id: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    presenters: BTreeMap<i64, Presenter>,
    themes: BTreeMap<i64, ShowTheme>,
    shows: BTreeMap<i64, ShowRow>,
    domes: BTreeMap<i64, PlanetariumDome>,
    sessions: BTreeMap<i64, ShowSession>,
    reservations: BTreeMap<i64, ReservationRow>,
    tickets: BTreeMap<i64, Ticket>,
}

/// Rows are never deleted, so the next id is one past the largest key.
fn next_id<V>(table: &BTreeMap<i64, V>) -> i64 {
    table.keys().next_back().map_or(1, |last| last + 1)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl Tables {
    fn show(&self, row: &ShowRow) -> AstronomyShow {
        AstronomyShow {
            id: row.id,
            title: row.title.clone(),
            description: row.description.clone(),
            themes: row
                .theme_ids
                .iter()
                .filter_map(|id| self.themes.get(id).cloned())
                .collect(),
            presenter: row.presenter_id.and_then(|id| self.presenters.get(&id).cloned()),
        }
    }

    fn taken_seats(&self, session_id: i64) -> Vec<Seat> {
        let mut seats: Vec<Seat> = self
            .tickets
            .values()
            .filter(|t| t.show_session_id == session_id)
            .map(|t| Seat { row: t.row, seat: t.seat })
            .collect();
        seats.sort();
        seats
    }

    fn is_taken(&self, session_id: i64, row: i32, seat: i32) -> bool {
        self.tickets
            .values()
            .any(|t| t.show_session_id == session_id && t.row == row && t.seat == seat)
    }

    fn summary(&self, session: &ShowSession) -> AppResult<SessionSummary> {
        let show = self
            .shows
            .get(&session.astronomy_show_id)
            .ok_or_else(|| AppError::Internal(format!("session {} has no show", session.id)))?;
        let dome = self
            .domes
            .get(&session.planetarium_dome_id)
            .ok_or_else(|| AppError::Internal(format!("session {} has no dome", session.id)))?;
        Ok(SessionSummary {
            id: session.id,
            show_time: session.show_time,
            show_id: show.id,
            show_title: show.title.clone(),
            presenter: show.presenter_id.and_then(|id| self.presenters.get(&id).cloned()),
            dome: dome.clone(),
            taken_places: self.tickets.values().filter(|t| t.show_session_id == session.id).count() as i64,
        })
    }

    fn matches(&self, session: &ShowSession, filter: &SessionFilter) -> bool {
        let Some(show) = self.shows.get(&session.astronomy_show_id) else {
            return false;
        };
        if let Some(title) = &filter.title {
            if !contains_ci(&show.title, title) {
                return false;
            }
        }
        if let Some(date) = filter.date {
            if session.show_time.date_naive() != date {
                return false;
            }
        }
        if let Some(theme) = &filter.theme {
            let any_theme = show
                .theme_ids
                .iter()
                .filter_map(|id| self.themes.get(id))
                .any(|t| contains_ci(&t.name, theme));
            if !any_theme {
                return false;
            }
        }
        true
    }

    fn reservation(&self, row: &ReservationRow) -> Reservation {
        Reservation {
            id: row.id,
            user_id: row.user_id,
            user_email: self
                .users
                .get(&row.user_id)
                .map(|u| u.email.clone())
                .unwrap_or_default(),
            created_at: row.created_at,
            tickets: self
                .tickets
                .values()
                .filter(|t| t.reservation_id == row.id)
                .cloned()
                .collect(),
        }
    }

    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| AppError::Internal("memory store lock poisoned".into()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| AppError::Internal("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl PlanetariumStore for MemoryStore {
    async fn list_themes(&self) -> AppResult<Vec<ShowTheme>> {
        Ok(self.read()?.themes.values().cloned().collect())
    }

    async fn create_theme(&self, input: NewShowTheme) -> AppResult<ShowTheme> {
        let mut tables = self.write()?;
        let theme = ShowTheme { id: next_id(&tables.themes), name: input.name };
        tables.themes.insert(theme.id, theme.clone());
        Ok(theme)
    }

    async fn list_presenters(&self) -> AppResult<Vec<Presenter>> {
        let mut presenters: Vec<Presenter> = self.read()?.presenters.values().cloned().collect();
        presenters.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id))
        });
        Ok(presenters)
    }

    async fn create_presenter(&self, input: NewPresenter) -> AppResult<Presenter> {
        let mut tables = self.write()?;
        let presenter = Presenter {
            id: next_id(&tables.presenters),
            first_name: input.first_name,
            last_name: input.last_name,
        };
        tables.presenters.insert(presenter.id, presenter.clone());
        Ok(presenter)
    }

    async fn list_shows(&self) -> AppResult<Vec<AstronomyShow>> {
        let tables = self.read()?;
        Ok(tables.shows.values().map(|row| tables.show(row)).collect())
    }

    async fn get_show(&self, id: i64) -> AppResult<Option<AstronomyShow>> {
        let tables = self.read()?;
        Ok(tables.shows.get(&id).map(|row| tables.show(row)))
    }

    async fn create_show(&self, input: NewAstronomyShow) -> AppResult<AstronomyShow> {
        let mut tables = self.write()?;

        let mut errors = FieldErrors::new();
        for id in &input.themes {
            if !tables.themes.contains_key(id) {
                errors.add("themes", booking::missing_reference(*id));
            }
        }
        if let Some(id) = input.presenter {
            if !tables.presenters.contains_key(&id) {
                errors.add("presenter", booking::missing_reference(id));
            }
        }
        errors.into_result()?;

        let mut theme_ids = input.themes;
        theme_ids.sort_unstable();
        theme_ids.dedup();
        let row = ShowRow {
            id: next_id(&tables.shows),
            title: input.title,
            description: input.description,
            presenter_id: input.presenter,
            theme_ids,
        };
        let show = tables.show(&row);
        tables.shows.insert(row.id, row);
        Ok(show)
    }

    async fn list_domes(&self) -> AppResult<Vec<PlanetariumDome>> {
        Ok(self.read()?.domes.values().cloned().collect())
    }

    async fn get_dome(&self, id: i64) -> AppResult<Option<PlanetariumDome>> {
        Ok(self.read()?.domes.get(&id).cloned())
    }

    async fn create_dome(&self, input: NewPlanetariumDome) -> AppResult<PlanetariumDome> {
        booking::validate_dome_dimensions(input.rows, input.seats_in_row)?;
        let mut tables = self.write()?;
        let dome = PlanetariumDome {
            id: next_id(&tables.domes),
            name: input.name,
            rows: input.rows,
            seats_in_row: input.seats_in_row,
        };
        tables.domes.insert(dome.id, dome.clone());
        Ok(dome)
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> AppResult<Vec<SessionSummary>> {
        let tables = self.read()?;
        let mut sessions = tables
            .sessions
            .values()
            .filter(|s| tables.matches(s, filter))
            .map(|s| tables.summary(s))
            .collect::<AppResult<Vec<_>>>()?;
        sessions.sort_by(|a, b| b.show_time.cmp(&a.show_time).then(b.id.cmp(&a.id)));
        Ok(sessions)
    }

    async fn get_session(&self, id: i64) -> AppResult<Option<SessionDetail>> {
        let tables = self.read()?;
        let Some(session) = tables.sessions.get(&id) else {
            return Ok(None);
        };
        let summary = tables.summary(session)?;
        let show = tables
            .shows
            .get(&session.astronomy_show_id)
            .map(|row| tables.show(row))
            .ok_or_else(|| AppError::Internal(format!("session {id} has no show")))?;
        Ok(Some(SessionDetail {
            summary,
            show,
            taken_seats: tables.taken_seats(id),
        }))
    }

    async fn create_session(&self, input: NewShowSession) -> AppResult<ShowSession> {
        let mut tables = self.write()?;

        let mut errors = FieldErrors::new();
        if !tables.shows.contains_key(&input.astronomy_show) {
            errors.add("astronomy_show", booking::missing_reference(input.astronomy_show));
        }
        if !tables.domes.contains_key(&input.planetarium_dome) {
            errors.add("planetarium_dome", booking::missing_reference(input.planetarium_dome));
        }
        errors.into_result()?;

        let session = ShowSession {
            id: next_id(&tables.sessions),
            astronomy_show_id: input.astronomy_show,
            planetarium_dome_id: input.planetarium_dome,
            show_time: input.show_time,
        };
        tables.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn list_reservations(&self, user_id: i64, page: Page) -> AppResult<Vec<Reservation>> {
        let tables = self.read()?;
        let mut rows: Vec<&ReservationRow> = tables
            .reservations
            .values()
            .filter(|r| r.user_id == user_id)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|row| tables.reservation(row))
            .collect())
    }

    async fn get_reservation(&self, user_id: i64, id: i64) -> AppResult<Option<Reservation>> {
        let tables = self.read()?;
        Ok(tables
            .reservations
            .get(&id)
            .filter(|r| r.user_id == user_id)
            .map(|row| tables.reservation(row)))
    }

    async fn create_reservation(
        &self,
        user_id: i64,
        tickets: &[TicketRequest],
        now: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        booking::validate_ticket_list(tickets)?;
        let mut tables = self.write()?;
        if !tables.users.contains_key(&user_id) {
            return Err(AppError::not_found("user", user_id));
        }

        // Seats claimed earlier in this same request count as taken.
        let mut staged: Vec<(i64, i32, i32)> = Vec::with_capacity(tickets.len());
        let mut errors = FieldErrors::new();
        for (index, request) in tickets.iter().enumerate() {
            let prefix = format!("tickets[{index}]");
            let Some(session) = tables.sessions.get(&request.show_session) else {
                errors.add(
                    format!("{prefix}.show_session"),
                    booking::missing_reference(request.show_session),
                );
                continue;
            };
            let dome = tables.domes.get(&session.planetarium_dome_id).ok_or_else(|| {
                AppError::Internal(format!("session {} has no dome", session.id))
            })?;
            let slot = SessionSlot { show_time: session.show_time, dome };
            let ticket_errors = booking::check_ticket(request, slot, now, |row, seat| {
                tables.is_taken(session.id, row, seat)
                    || staged.contains(&(session.id, row, seat))
            });
            if ticket_errors.is_empty() {
                staged.push((session.id, request.row, request.seat));
            } else {
                errors.merge_prefixed(&prefix, ticket_errors);
            }
        }
        errors.into_result()?;

        let row = ReservationRow {
            id: next_id(&tables.reservations),
            user_id,
            created_at: now,
        };
        tables.reservations.insert(row.id, row.clone());
        for (session_id, seat_row, seat) in staged {
            let ticket = Ticket {
                id: next_id(&tables.tickets),
                row: seat_row,
                seat,
                show_session_id: session_id,
                reservation_id: row.id,
            };
            tables.tickets.insert(ticket.id, ticket);
        }
        Ok(tables.reservation(&row))
    }

    async fn create_user(&self, input: NewUser) -> AppResult<User> {
        let mut tables = self.write()?;
        if tables.email_taken(&input.email, None) {
            return Err(AppError::Validation(FieldErrors::single("email", EMAIL_TAKEN)));
        }
        let user = User {
            id: next_id(&tables.users),
            email: input.email,
            password_hash: input.password_hash,
            is_staff: input.is_staff,
            date_joined: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.read()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> AppResult<User> {
        let mut tables = self.write()?;
        if let Some(email) = &changes.email {
            if tables.email_taken(email, Some(id)) {
                return Err(AppError::Validation(FieldErrors::single("email", EMAIL_TAKEN)));
            }
        }
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("user", id))?;
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        Ok(user.clone())
    }
}
