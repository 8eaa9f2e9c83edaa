use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Presenter {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

impl Presenter {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPresenter {
    #[validate(length(min = 1, max = 100, message = "Ensure this field has between 1 and 100 characters."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Ensure this field has between 1 and 100 characters."))]
    pub last_name: String,
}
