use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};

use super::PlanetariumStore;
use crate::error::{
    is_lock_conflict, AppError, AppResult, FieldErrors, CONCURRENT_BOOKING, EMAIL_CONSTRAINT,
    EMAIL_TAKEN, SEAT_CONSTRAINT, SEAT_TAKEN,
};
use crate::models::{
    AstronomyShow, NewAstronomyShow, NewPlanetariumDome, NewPresenter, NewShowSession,
    NewShowTheme, NewUser, Page, PlanetariumDome, Presenter, Reservation, Seat, SessionDetail,
    SessionFilter, SessionSummary, ShowSession, ShowTheme, Ticket, TicketRequest, User,
    UserChanges,
};
use crate::services::booking::{self, SessionSlot};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/* ---------- row types ---------- */

#[derive(FromRow)]
struct ShowRow {
    id: i64,
    title: String,
    description: String,
    presenter_id: Option<i64>,
    presenter_first_name: Option<String>,
    presenter_last_name: Option<String>,
}

#[derive(FromRow)]
struct ShowThemeRow {
    astronomy_show_id: i64,
    id: i64,
    name: String,
}

#[derive(FromRow)]
struct SessionRow {
    id: i64,
    show_time: DateTime<Utc>,
    show_id: i64,
    show_title: String,
    presenter_id: Option<i64>,
    presenter_first_name: Option<String>,
    presenter_last_name: Option<String>,
    dome_id: i64,
    dome_name: String,
    dome_rows: i32,
    dome_seats_in_row: i32,
    taken_places: i64,
}

#[derive(FromRow)]
struct ReservationRow {
    id: i64,
    user_id: i64,
    user_email: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SlotRow {
    show_time: DateTime<Utc>,
    dome_id: i64,
    dome_name: String,
    dome_rows: i32,
    dome_seats_in_row: i32,
}

fn presenter_from(id: Option<i64>, first: Option<String>, last: Option<String>) -> Option<Presenter> {
    Some(Presenter {
        id: id?,
        first_name: first.unwrap_or_default(),
        last_name: last.unwrap_or_default(),
    })
}

impl From<SessionRow> for SessionSummary {
    fn from(r: SessionRow) -> Self {
        SessionSummary {
            id: r.id,
            show_time: r.show_time,
            show_id: r.show_id,
            show_title: r.show_title,
            presenter: presenter_from(r.presenter_id, r.presenter_first_name, r.presenter_last_name),
            dome: PlanetariumDome {
                id: r.dome_id,
                name: r.dome_name,
                rows: r.dome_rows,
                seats_in_row: r.dome_seats_in_row,
            },
            taken_places: r.taken_places,
        }
    }
}

/// Escapes LIKE metacharacters and wraps the needle for a substring match.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

const SHOW_SELECT: &str = r#"
    SELECT s.id, s.title, s.description,
           p.id AS presenter_id,
           p.first_name AS presenter_first_name,
           p.last_name AS presenter_last_name
    FROM astronomy_shows s
    LEFT JOIN presenters p ON p.id = s.presenter_id
"#;

const SESSION_SELECT: &str = r#"
    SELECT ss.id, ss.show_time,
           sh.id AS show_id, sh.title AS show_title,
           p.id AS presenter_id,
           p.first_name AS presenter_first_name,
           p.last_name AS presenter_last_name,
           d.id AS dome_id, d.name AS dome_name,
           d.rows AS dome_rows, d.seats_in_row AS dome_seats_in_row,
           (SELECT COUNT(*) FROM tickets t WHERE t.show_session_id = ss.id) AS taken_places
    FROM show_sessions ss
    JOIN astronomy_shows sh ON sh.id = ss.astronomy_show_id
    JOIN planetarium_domes d ON d.id = ss.planetarium_dome_id
    LEFT JOIN presenters p ON p.id = sh.presenter_id
"#;

impl PgStore {
    async fn themes_for(&self, show_ids: &[i64]) -> AppResult<HashMap<i64, Vec<ShowTheme>>> {
        let rows = sqlx::query_as::<_, ShowThemeRow>(
            r#"
            SELECT ast.astronomy_show_id, t.id, t.name
            FROM astronomy_show_themes ast
            JOIN show_themes t ON t.id = ast.show_theme_id
            WHERE ast.astronomy_show_id = ANY($1)
            ORDER BY t.id
            "#,
        )
        .bind(show_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut map: HashMap<i64, Vec<ShowTheme>> = HashMap::new();
        for r in rows {
            map.entry(r.astronomy_show_id)
                .or_default()
                .push(ShowTheme { id: r.id, name: r.name });
        }
        Ok(map)
    }

    async fn hydrate_shows(&self, rows: Vec<ShowRow>) -> AppResult<Vec<AstronomyShow>> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut themes = self.themes_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|r| AstronomyShow {
                id: r.id,
                title: r.title,
                description: r.description,
                themes: themes.remove(&r.id).unwrap_or_default(),
                presenter: presenter_from(r.presenter_id, r.presenter_first_name, r.presenter_last_name),
            })
            .collect())
    }

    async fn tickets_for(&self, reservation_ids: &[i64]) -> AppResult<HashMap<i64, Vec<Ticket>>> {
        let rows = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT id, row, seat, show_session_id, reservation_id
            FROM tickets
            WHERE reservation_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(reservation_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut map: HashMap<i64, Vec<Ticket>> = HashMap::new();
        for t in rows {
            map.entry(t.reservation_id).or_default().push(t);
        }
        Ok(map)
    }

    async fn hydrate_reservations(&self, rows: Vec<ReservationRow>) -> AppResult<Vec<Reservation>> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut tickets = self.tickets_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|r| Reservation {
                id: r.id,
                user_id: r.user_id,
                user_email: r.user_email,
                created_at: r.created_at,
                tickets: tickets.remove(&r.id).unwrap_or_default(),
            })
            .collect())
    }
}

// Pre-check failures are `Ok(Err(_))` and leave the transaction usable.
// A concurrent writer that slips past them hits `unique_seat_per_session`,
// which aborts the transaction and comes back as `Err`.
async fn insert_ticket(
    tx: &mut Transaction<'_, Postgres>,
    index: usize,
    reservation_id: i64,
    request: &TicketRequest,
    now: DateTime<Utc>,
) -> AppResult<Result<Ticket, FieldErrors>> {
    let slot = sqlx::query_as::<_, SlotRow>(
        r#"
        SELECT ss.show_time,
               d.id AS dome_id, d.name AS dome_name,
               d.rows AS dome_rows, d.seats_in_row AS dome_seats_in_row
        FROM show_sessions ss
        JOIN planetarium_domes d ON d.id = ss.planetarium_dome_id
        WHERE ss.id = $1
        "#,
    )
    .bind(request.show_session)
    .fetch_optional(&mut **tx)
    .await?;

    let Some(slot) = slot else {
        return Ok(Err(FieldErrors::single(
            "show_session",
            booking::missing_reference(request.show_session),
        )));
    };
    let dome = PlanetariumDome {
        id: slot.dome_id,
        name: slot.dome_name,
        rows: slot.dome_rows,
        seats_in_row: slot.dome_seats_in_row,
    };

    let placement_ok = booking::check_ticket_placement(request.row, request.seat, &dome).is_empty();
    let taken = if placement_ok {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM tickets WHERE show_session_id = $1 AND row = $2 AND seat = $3)",
        )
        .bind(request.show_session)
        .bind(request.row)
        .bind(request.seat)
        .fetch_one(&mut **tx)
        .await?
    } else {
        false
    };

    let errors = booking::check_ticket(
        request,
        SessionSlot { show_time: slot.show_time, dome: &dome },
        now,
        |_, _| taken,
    );
    if !errors.is_empty() {
        return Ok(Err(errors));
    }

    let inserted = sqlx::query_as::<_, Ticket>(
        r#"
        INSERT INTO tickets (row, seat, show_session_id, reservation_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, row, seat, show_session_id, reservation_id
        "#,
    )
    .bind(request.row)
    .bind(request.seat)
    .bind(request.show_session)
    .bind(reservation_id)
    .fetch_one(&mut **tx)
    .await;

    match inserted {
        Ok(ticket) => Ok(Ok(ticket)),
        Err(sqlx::Error::Database(db_err)) if db_err.constraint() == Some(SEAT_CONSTRAINT) => {
            warn!(
                session_id = request.show_session,
                row = request.row,
                seat = request.seat,
                "seat claimed by a concurrent reservation"
            );
            Err(AppError::Validation(FieldErrors::single(
                format!("tickets[{index}].seat"),
                SEAT_TAKEN,
            )))
        }
        Err(e) => Err(e.into()),
    }
}

// A reservation aborted by the lock manager lost a race, it did not fail.
fn lock_conflict(err: AppError) -> AppError {
    match err {
        AppError::Database(db_err) if is_lock_conflict(&db_err) => {
            warn!(error = %db_err, "reservation aborted by a concurrent booking");
            AppError::Conflict(CONCURRENT_BOOKING.to_string())
        }
        other => other,
    }
}

fn email_violation(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.constraint() == Some(EMAIL_CONSTRAINT) => {
            AppError::Validation(FieldErrors::single("email", EMAIL_TAKEN))
        }
        _ => err.into(),
    }
}

#[async_trait]
impl PlanetariumStore for PgStore {
    async fn list_themes(&self) -> AppResult<Vec<ShowTheme>> {
        Ok(sqlx::query_as::<_, ShowTheme>("SELECT id, name FROM show_themes ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_theme(&self, input: NewShowTheme) -> AppResult<ShowTheme> {
        Ok(sqlx::query_as::<_, ShowTheme>(
            "INSERT INTO show_themes (name) VALUES ($1) RETURNING id, name",
        )
        .bind(input.name)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_presenters(&self) -> AppResult<Vec<Presenter>> {
        Ok(sqlx::query_as::<_, Presenter>(
            "SELECT id, first_name, last_name FROM presenters ORDER BY last_name, first_name, id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_presenter(&self, input: NewPresenter) -> AppResult<Presenter> {
        Ok(sqlx::query_as::<_, Presenter>(
            "INSERT INTO presenters (first_name, last_name) VALUES ($1, $2) RETURNING id, first_name, last_name",
        )
        .bind(input.first_name)
        .bind(input.last_name)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_shows(&self) -> AppResult<Vec<AstronomyShow>> {
        let rows = sqlx::query_as::<_, ShowRow>(&format!("{SHOW_SELECT} ORDER BY s.id"))
            .fetch_all(&self.pool)
            .await?;
        self.hydrate_shows(rows).await
    }

    async fn get_show(&self, id: i64) -> AppResult<Option<AstronomyShow>> {
        let row = sqlx::query_as::<_, ShowRow>(&format!("{SHOW_SELECT} WHERE s.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.hydrate_shows(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn create_show(&self, input: NewAstronomyShow) -> AppResult<AstronomyShow> {
        let mut theme_ids = input.themes.clone();
        theme_ids.sort_unstable();
        theme_ids.dedup();

        let mut tx = self.pool.begin().await?;

        let known: Vec<i64> = sqlx::query_scalar("SELECT id FROM show_themes WHERE id = ANY($1)")
            .bind(theme_ids.as_slice())
            .fetch_all(&mut *tx)
            .await?;
        let mut errors = FieldErrors::new();
        for id in theme_ids.iter().filter(|id| !known.contains(id)) {
            errors.add("themes", booking::missing_reference(*id));
        }
        if let Some(presenter_id) = input.presenter {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM presenters WHERE id = $1)")
                .bind(presenter_id)
                .fetch_one(&mut *tx)
                .await?;
            if !exists {
                errors.add("presenter", booking::missing_reference(presenter_id));
            }
        }
        errors.into_result()?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO astronomy_shows (title, description, presenter_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.presenter)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO astronomy_show_themes (astronomy_show_id, show_theme_id)
            SELECT $1, UNNEST($2::BIGINT[])
            "#,
        )
        .bind(id)
        .bind(theme_ids.as_slice())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_show(id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("show {id} vanished after insert")))
    }

    async fn list_domes(&self) -> AppResult<Vec<PlanetariumDome>> {
        Ok(sqlx::query_as::<_, PlanetariumDome>(
            "SELECT id, name, rows, seats_in_row FROM planetarium_domes ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_dome(&self, id: i64) -> AppResult<Option<PlanetariumDome>> {
        Ok(sqlx::query_as::<_, PlanetariumDome>(
            "SELECT id, name, rows, seats_in_row FROM planetarium_domes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_dome(&self, input: NewPlanetariumDome) -> AppResult<PlanetariumDome> {
        booking::validate_dome_dimensions(input.rows, input.seats_in_row)?;
        Ok(sqlx::query_as::<_, PlanetariumDome>(
            r#"
            INSERT INTO planetarium_domes (name, rows, seats_in_row)
            VALUES ($1, $2, $3)
            RETURNING id, name, rows, seats_in_row
            "#,
        )
        .bind(input.name)
        .bind(input.rows)
        .bind(input.seats_in_row)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> AppResult<Vec<SessionSummary>> {
        // EXISTS keeps one row per session however many themes match.
        let sql = format!(
            r#"{SESSION_SELECT}
            WHERE ($1::TEXT IS NULL OR EXISTS (
                      SELECT 1
                      FROM astronomy_show_themes ast
                      JOIN show_themes t ON t.id = ast.show_theme_id
                      WHERE ast.astronomy_show_id = sh.id AND t.name ILIKE $1))
              AND ($2::DATE IS NULL OR (ss.show_time AT TIME ZONE 'UTC')::DATE = $2)
              AND ($3::TEXT IS NULL OR sh.title ILIKE $3)
            ORDER BY ss.show_time DESC, ss.id DESC
            "#
        );
        let rows = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(filter.theme.as_deref().map(like_pattern))
            .bind(filter.date)
            .bind(filter.title.as_deref().map(like_pattern))
            .fetch_all(&self.pool)
            .await?;
        debug!(count = rows.len(), ?filter, "listed sessions");
        Ok(rows.into_iter().map(SessionSummary::from).collect())
    }

    async fn get_session(&self, id: i64) -> AppResult<Option<SessionDetail>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!("{SESSION_SELECT} WHERE ss.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let summary = SessionSummary::from(row);
        let show = self
            .get_show(summary.show_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("session {id} has no show")))?;
        let taken_seats = sqlx::query_as::<_, Seat>(
            "SELECT row, seat FROM tickets WHERE show_session_id = $1 ORDER BY row, seat",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Some(SessionDetail { summary, show, taken_seats }))
    }

    async fn create_session(&self, input: NewShowSession) -> AppResult<ShowSession> {
        let show_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM astronomy_shows WHERE id = $1)")
            .bind(input.astronomy_show)
            .fetch_one(&self.pool)
            .await?;
        let dome_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM planetarium_domes WHERE id = $1)")
            .bind(input.planetarium_dome)
            .fetch_one(&self.pool)
            .await?;
        let mut errors = FieldErrors::new();
        if !show_exists {
            errors.add("astronomy_show", booking::missing_reference(input.astronomy_show));
        }
        if !dome_exists {
            errors.add("planetarium_dome", booking::missing_reference(input.planetarium_dome));
        }
        errors.into_result()?;

        Ok(sqlx::query_as::<_, ShowSession>(
            r#"
            INSERT INTO show_sessions (astronomy_show_id, planetarium_dome_id, show_time)
            VALUES ($1, $2, $3)
            RETURNING id, astronomy_show_id, planetarium_dome_id, show_time
            "#,
        )
        .bind(input.astronomy_show)
        .bind(input.planetarium_dome)
        .bind(input.show_time)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_reservations(&self, user_id: i64, page: Page) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT r.id, r.user_id, u.email AS user_email, r.created_at
            FROM reservations r
            JOIN users u ON u.id = r.user_id
            WHERE r.user_id = $1
            ORDER BY r.created_at DESC, r.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_reservations(rows).await
    }

    async fn get_reservation(&self, user_id: i64, id: i64) -> AppResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT r.id, r.user_id, u.email AS user_email, r.created_at
            FROM reservations r
            JOIN users u ON u.id = r.user_id
            WHERE r.id = $1 AND r.user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(self.hydrate_reservations(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn create_reservation(
        &self,
        user_id: i64,
        tickets: &[TicketRequest],
        now: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        booking::validate_ticket_list(tickets)?;

        // Dropping `tx` without commit rolls everything back.
        let mut tx = self.pool.begin().await?;

        let user_email: String = sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("user", user_id))?;

        let (reservation_id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO reservations (user_id, created_at) VALUES ($1, $2) RETURNING id, created_at",
        )
        .bind(user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let mut created = Vec::with_capacity(tickets.len());
        let mut errors = FieldErrors::new();
        for index in booking::insertion_order(tickets) {
            let request = &tickets[index];
            match insert_ticket(&mut tx, index, reservation_id, request, now)
                .await
                .map_err(lock_conflict)?
            {
                Ok(ticket) => created.push(ticket),
                Err(ticket_errors) => errors.merge_prefixed(&format!("tickets[{index}]"), ticket_errors),
            }
        }
        if !errors.is_empty() {
            tx.rollback().await?;
            return Err(AppError::Validation(errors));
        }

        tx.commit().await.map_err(|e| lock_conflict(e.into()))?;

        info!(reservation_id, user_id, tickets = created.len(), "reservation committed");
        Ok(Reservation {
            id: reservation_id,
            user_id,
            user_email,
            created_at,
            tickets: created,
        })
    }

    async fn create_user(&self, input: NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, is_staff)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, is_staff, date_joined
            "#,
        )
        .bind(input.email)
        .bind(input.password_hash)
        .bind(input.is_staff)
        .fetch_one(&self.pool)
        .await
        .map_err(email_violation)
    }

    async fn find_user(&self, id: i64) -> AppResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, is_staff, date_joined FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, is_staff, date_joined FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                password_hash = COALESCE($3, password_hash)
            WHERE id = $1
            RETURNING id, email, password_hash, is_staff, date_joined
            "#,
        )
        .bind(id)
        .bind(changes.email)
        .bind(changes.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(email_violation)?
        .ok_or_else(|| AppError::not_found("user", id))
    }
}
