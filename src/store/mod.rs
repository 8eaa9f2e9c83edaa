// PgStore in production, MemoryStore for tests and STORAGE=memory. Both keep
// reservation creation all-or-nothing and (session, row, seat) unique.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::models::{
    AstronomyShow, NewAstronomyShow, NewPlanetariumDome, NewPresenter, NewShowSession,
    NewShowTheme, NewUser, Page, PlanetariumDome, Presenter, Reservation, SessionDetail,
    SessionFilter, SessionSummary, ShowSession, ShowTheme, TicketRequest, User, UserChanges,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait PlanetariumStore: Send + Sync {
    async fn list_themes(&self) -> AppResult<Vec<ShowTheme>>;
    async fn create_theme(&self, input: NewShowTheme) -> AppResult<ShowTheme>;

    async fn list_presenters(&self) -> AppResult<Vec<Presenter>>;
    async fn create_presenter(&self, input: NewPresenter) -> AppResult<Presenter>;

    async fn list_shows(&self) -> AppResult<Vec<AstronomyShow>>;
    async fn get_show(&self, id: i64) -> AppResult<Option<AstronomyShow>>;
    /// Fails with field errors on `themes` / `presenter` for unknown references.
    async fn create_show(&self, input: NewAstronomyShow) -> AppResult<AstronomyShow>;

    async fn list_domes(&self) -> AppResult<Vec<PlanetariumDome>>;
    async fn get_dome(&self, id: i64) -> AppResult<Option<PlanetariumDome>>;
    async fn create_dome(&self, input: NewPlanetariumDome) -> AppResult<PlanetariumDome>;

    /// Sessions matching every filter that is set, newest first, without duplicates.
    async fn list_sessions(&self, filter: &SessionFilter) -> AppResult<Vec<SessionSummary>>;
    async fn get_session(&self, id: i64) -> AppResult<Option<SessionDetail>>;
    async fn create_session(&self, input: NewShowSession) -> AppResult<ShowSession>;

    async fn list_reservations(&self, user_id: i64, page: Page) -> AppResult<Vec<Reservation>>;
    /// `None` both for unknown ids and for reservations owned by someone else.
    async fn get_reservation(&self, user_id: i64, id: i64) -> AppResult<Option<Reservation>>;
    /// Inserts one reservation and all of its tickets in a single unit of work.
    ///
    /// Each ticket is validated immediately before it is written; any failure
    /// discards the whole reservation.
    async fn create_reservation(
        &self,
        user_id: i64,
        tickets: &[TicketRequest],
        now: DateTime<Utc>,
    ) -> AppResult<Reservation>;

    async fn create_user(&self, input: NewUser) -> AppResult<User>;
    async fn find_user(&self, id: i64) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn update_user(&self, id: i64, changes: UserChanges) -> AppResult<User>;
}
