// JSON projections of domain records. Handlers never serialize models directly.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{
    AstronomyShow, PlanetariumDome, Presenter, Reservation, Seat, SessionDetail, SessionSummary,
    ShowSession, ShowTheme, Ticket, User,
};
use crate::policy::Shape;

#[derive(Debug, Serialize)]
pub struct ThemeView {
    pub id: i64,
    pub name: String,
}

impl From<ShowTheme> for ThemeView {
    fn from(theme: ShowTheme) -> Self {
        ThemeView { id: theme.id, name: theme.name }
    }
}

#[derive(Debug, Serialize)]
pub struct PresenterView {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
}

impl From<Presenter> for PresenterView {
    fn from(presenter: Presenter) -> Self {
        PresenterView {
            full_name: presenter.full_name(),
            id: presenter.id,
            first_name: presenter.first_name,
            last_name: presenter.last_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DomeView {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub capacity: i64,
}

impl From<PlanetariumDome> for DomeView {
    fn from(dome: PlanetariumDome) -> Self {
        DomeView {
            capacity: dome.capacity(),
            id: dome.id,
            name: dome.name,
            rows: dome.rows,
            seats_in_row: dome.seats_in_row,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShowListView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub themes: Vec<String>,
    pub presenter: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ShowDetailView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub themes: Vec<ThemeView>,
    pub presenter: Option<PresenterView>,
}

#[derive(Debug, Serialize)]
pub struct ShowWriteView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub themes: Vec<i64>,
    pub presenter: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ShowView {
    List(ShowListView),
    Detail(ShowDetailView),
    Write(ShowWriteView),
}

impl ShowView {
    pub fn project(show: AstronomyShow, shape: Shape) -> Self {
        match shape {
            Shape::List => ShowView::List(ShowListView::from(show)),
            Shape::Detail => ShowView::Detail(ShowDetailView {
                id: show.id,
                title: show.title,
                description: show.description,
                themes: show.themes.into_iter().map(ThemeView::from).collect(),
                presenter: show.presenter.map(PresenterView::from),
            }),
            Shape::Write => ShowView::Write(ShowWriteView {
                id: show.id,
                title: show.title,
                description: show.description,
                themes: show.themes.iter().map(|t| t.id).collect(),
                presenter: show.presenter.as_ref().map(|p| p.id),
            }),
        }
    }
}

impl From<AstronomyShow> for ShowListView {
    fn from(show: AstronomyShow) -> Self {
        ShowListView {
            presenter: show.presenter.as_ref().map(Presenter::full_name),
            themes: show.themes.into_iter().map(|t| t.name).collect(),
            id: show.id,
            title: show.title,
            description: show.description,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionListView {
    pub id: i64,
    /// Show title.
    pub astronomy_show: String,
    pub presenter: Option<String>,
    pub show_time: DateTime<Utc>,
    pub planetarium_dome: String,
    pub available_seats: i64,
}

impl From<SessionSummary> for SessionListView {
    fn from(session: SessionSummary) -> Self {
        SessionListView {
            available_seats: session.available_seats(),
            presenter: session.presenter.as_ref().map(Presenter::full_name),
            id: session.id,
            astronomy_show: session.show_title,
            show_time: session.show_time,
            planetarium_dome: session.dome.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionDetailView {
    pub id: i64,
    pub show_time: DateTime<Utc>,
    pub astronomy_show: ShowListView,
    pub planetarium_dome: DomeView,
    pub presenter: Option<PresenterView>,
    pub taken_places: i64,
    pub taken_seats: Vec<Seat>,
    pub available_seats: i64,
    pub is_full: bool,
}

impl From<SessionDetail> for SessionDetailView {
    fn from(detail: SessionDetail) -> Self {
        let SessionDetail { summary, show, taken_seats } = detail;
        SessionDetailView {
            available_seats: summary.available_seats(),
            is_full: summary.is_full(),
            id: summary.id,
            show_time: summary.show_time,
            presenter: summary.presenter.map(PresenterView::from),
            planetarium_dome: DomeView::from(summary.dome),
            taken_places: summary.taken_places,
            astronomy_show: ShowListView::from(show),
            taken_seats,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionWriteView {
    pub id: i64,
    pub astronomy_show: i64,
    pub planetarium_dome: i64,
    pub show_time: DateTime<Utc>,
}

impl From<ShowSession> for SessionWriteView {
    fn from(session: ShowSession) -> Self {
        SessionWriteView {
            id: session.id,
            astronomy_show: session.astronomy_show_id,
            planetarium_dome: session.planetarium_dome_id,
            show_time: session.show_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TicketView {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    pub show_session: i64,
}

impl From<Ticket> for TicketView {
    fn from(ticket: Ticket) -> Self {
        TicketView {
            id: ticket.id,
            row: ticket.row,
            seat: ticket.seat,
            show_session: ticket.show_session_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReservationView {
    pub id: i64,
    /// Owner e-mail.
    pub user: String,
    pub created_at: DateTime<Utc>,
    pub tickets: Vec<TicketView>,
}

impl From<Reservation> for ReservationView {
    fn from(reservation: Reservation) -> Self {
        ReservationView {
            id: reservation.id,
            user: reservation.user_email,
            created_at: reservation.created_at,
            tickets: reservation.tickets.into_iter().map(TicketView::from).collect(),
        }
    }
}

// never carries the password hash
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub is_staff: bool,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        UserView { id: user.id, email: user.email, is_staff: user.is_staff }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn show() -> AstronomyShow {
        AstronomyShow {
            id: 7,
            title: "Mars".into(),
            description: "Red planet".into(),
            themes: vec![
                ShowTheme { id: 1, name: "Planets".into() },
                ShowTheme { id: 2, name: "Space".into() },
            ],
            presenter: Some(Presenter { id: 3, first_name: "Carl".into(), last_name: "Sagan".into() }),
        }
    }

    fn dome() -> PlanetariumDome {
        PlanetariumDome { id: 4, name: "Main".into(), rows: 5, seats_in_row: 10 }
    }

    #[test]
    fn show_list_flattens_relations() {
        let value = serde_json::to_value(ShowView::project(show(), Shape::List)).unwrap();
        assert_eq!(value["themes"], json!(["Planets", "Space"]));
        assert_eq!(value["presenter"], json!("Carl Sagan"));
    }

    #[test]
    fn show_detail_nests_relations() {
        let value = serde_json::to_value(ShowView::project(show(), Shape::Detail)).unwrap();
        assert_eq!(value["themes"][1], json!({"id": 2, "name": "Space"}));
        assert_eq!(value["presenter"]["full_name"], json!("Carl Sagan"));
    }

    #[test]
    fn show_write_uses_ids() {
        let mut record = show();
        record.presenter = None;
        let value = serde_json::to_value(ShowView::project(record, Shape::Write)).unwrap();
        assert_eq!(value["themes"], json!([1, 2]));
        assert_eq!(value["presenter"], json!(null));
    }

    #[test]
    fn session_detail_reports_occupancy() {
        let summary = SessionSummary {
            id: 9,
            show_time: Utc.with_ymd_and_hms(2030, 1, 1, 20, 0, 0).unwrap(),
            show_id: 7,
            show_title: "Mars".into(),
            presenter: None,
            dome: dome(),
            taken_places: 2,
        };
        let detail = SessionDetail {
            summary,
            show: show(),
            taken_seats: vec![Seat { row: 1, seat: 1 }, Seat { row: 2, seat: 3 }],
        };
        let value = serde_json::to_value(SessionDetailView::from(detail)).unwrap();
        assert_eq!(value["available_seats"], json!(48));
        assert_eq!(value["is_full"], json!(false));
        assert_eq!(value["planetarium_dome"]["capacity"], json!(50));
        assert_eq!(value["taken_seats"][1], json!({"row": 2, "seat": 3}));
        assert_eq!(value["astronomy_show"]["presenter"], json!("Carl Sagan"));
    }

    #[test]
    fn user_view_has_no_password() {
        let user = User {
            id: 1,
            email: "a@b.c".into(),
            password_hash: "$2b$04$secret".into(),
            is_staff: false,
            date_joined: Utc::now(),
        };
        let value = serde_json::to_value(UserView::from(user)).unwrap();
        assert!(value.get("password").is_none());
        assert!(value.get("password_hash").is_none());
        assert!(!value.to_string().contains("secret"));
    }
}
