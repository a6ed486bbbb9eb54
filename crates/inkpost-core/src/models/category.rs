use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::patch::Patch;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be between 1 and 50 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 50, message = "Slug must be between 1 and 50 characters"))]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 50, message = "Name must be between 1 and 50 characters"))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 50, message = "Slug must be between 1 and 50 characters"))]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Patch<String>,
}
