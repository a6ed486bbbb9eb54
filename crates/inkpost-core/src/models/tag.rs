use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Tag joined to the post it is attached to (batch loading for listings)
#[derive(Debug, Clone)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PostTagRow {
    pub post_id: i64,
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl From<PostTagRow> for Tag {
    fn from(row: PostTagRow) -> Self {
        Tag {
            id: row.id,
            name: row.name,
            slug: row.slug,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be between 1 and 50 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 50, message = "Slug must be between 1 and 50 characters"))]
    pub slug: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTagRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 50))]
    pub slug: Option<String>,
}
