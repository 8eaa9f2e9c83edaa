use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ShowTheme {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewShowTheme {
    #[validate(length(min = 1, max = 100, message = "Ensure this field has between 1 and 100 characters."))]
    pub name: String,
}
