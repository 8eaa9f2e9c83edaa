use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Ticket {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    pub show_session_id: i64,
    pub reservation_id: i64,
}

/// A booking made by one user. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub id: i64,
    pub user_id: i64,
    pub user_email: String,
    pub created_at: DateTime<Utc>,
    pub tickets: Vec<Ticket>,
}

/// One requested seat in a reservation payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TicketRequest {
    pub row: i32,
    pub seat: i32,
    pub show_session: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub const DEFAULT_SIZE: u32 = 50;
    pub const MAX_SIZE: u32 = 100;

    pub fn new(number: Option<u32>, size: Option<u32>) -> Self {
        Page {
            number: number.unwrap_or(1).max(1),
            size: size.unwrap_or(Self::DEFAULT_SIZE).clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.number - 1) * i64::from(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(None, None)
    }
}
