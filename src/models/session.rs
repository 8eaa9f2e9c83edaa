use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{AstronomyShow, PlanetariumDome, Presenter};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct ShowSession {
    pub id: i64,
    pub astronomy_show_id: i64,
    pub planetarium_dome_id: i64,
    pub show_time: DateTime<Utc>,
}

// joined with what the list view needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: i64,
    pub show_time: DateTime<Utc>,
    pub show_id: i64,
    pub show_title: String,
    pub presenter: Option<Presenter>,
    pub dome: PlanetariumDome,
    pub taken_places: i64,
}

impl SessionSummary {
    pub fn available_seats(&self) -> i64 {
        (self.dome.capacity() - self.taken_places).max(0)
    }

    pub fn is_full(&self) -> bool {
        self.available_seats() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, FromRow, Serialize)]
pub struct Seat {
    pub row: i32,
    pub seat: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDetail {
    pub summary: SessionSummary,
    pub show: AstronomyShow,
    pub taken_seats: Vec<Seat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewShowSession {
    pub astronomy_show: i64,
    pub planetarium_dome: i64,
    pub show_time: DateTime<Utc>,
}

/// Conjunctive filters for session listing; `None` means "don't filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    /// Case-insensitive substring of any of the show's theme names.
    pub theme: Option<String>,
    /// Exact (UTC) calendar date of `show_time`.
    pub date: Option<NaiveDate>,
    /// Case-insensitive substring of the show title.
    pub title: Option<String>,
}
