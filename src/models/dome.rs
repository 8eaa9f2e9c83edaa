use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PlanetariumDome {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
}

impl PlanetariumDome {
    /// Always derived from the grid, never stored.
    pub fn capacity(&self) -> i64 {
        i64::from(self.rows) * i64::from(self.seats_in_row)
    }
}

/// Dimensions are checked by `services::booking::validate_dome_dimensions`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPlanetariumDome {
    #[validate(length(min = 1, max = 100, message = "Ensure this field has between 1 and 100 characters."))]
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
}
