pub mod dome;
pub mod presenter;
pub mod reservation;
pub mod session;
pub mod show;
pub mod theme;
pub mod user;

pub use dome::{NewPlanetariumDome, PlanetariumDome};
pub use presenter::{NewPresenter, Presenter};
pub use reservation::{Page, Reservation, Ticket, TicketRequest};
pub use session::{NewShowSession, Seat, SessionDetail, SessionFilter, SessionSummary, ShowSession};
pub use show::{AstronomyShow, NewAstronomyShow};
pub use theme::{NewShowTheme, ShowTheme};
pub use user::{normalize_email, NewUser, User, UserChanges};
