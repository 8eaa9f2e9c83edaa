use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Presenter, ShowTheme};

/// An astronomy show with its themes and presenter resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AstronomyShow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub themes: Vec<ShowTheme>,
    pub presenter: Option<Presenter>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAstronomyShow {
    #[validate(length(min = 1, max = 100, message = "Ensure this field has between 1 and 100 characters."))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub themes: Vec<i64>,
    #[serde(default)]
    pub presenter: Option<i64>,
}
