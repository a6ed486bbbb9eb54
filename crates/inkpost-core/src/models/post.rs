use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use validator::Validate;

use super::{Category, Tag};
use crate::pagination::{Seekable, SortField, SortValue};
use crate::patch::Patch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
    Archived,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Archived => "archived",
        }
    }
}

impl Display for PostStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            "archived" => Ok(PostStatus::Archived),
            _ => Err(anyhow::anyhow!("Invalid post status: {}", s)),
        }
    }
}

/// Row of the `posts` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Post {
    pub id: i64,
    pub category_id: Option<i64>,
    pub author_id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub cover_image_url: String,
    pub status: String,
    pub view_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published.as_str()
    }
}

impl Seekable for Post {
    fn seek_id(&self) -> i64 {
        self.id
    }

    fn sort_value(&self, field: SortField) -> SortValue {
        match field {
            SortField::PublishedAt => self
                .published_at
                .map(SortValue::Timestamp)
                .unwrap_or(SortValue::Absent),
            SortField::CreatedAt => SortValue::Timestamp(self.created_at),
            SortField::UpdatedAt => SortValue::Timestamp(self.updated_at),
            SortField::ViewCount => SortValue::Integer(self.view_count),
            SortField::Title => SortValue::Text(self.title.clone()),
        }
    }
}

/// Post with its category and tags, as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Seekable for PostView {
    fn seek_id(&self) -> i64 {
        self.post.id
    }

    fn sort_value(&self, field: SortField) -> SortValue {
        self.post.sort_value(field)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub category_id: Option<i64>,
    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "Slug must be between 1 and 255 characters"))]
    pub slug: String,
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub cover_image_url: String,
    pub status: PostStatus,
    /// Tag slugs; every one must already exist
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub category_id: Patch<i64>,
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"))]
    pub title: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "Slug must be between 1 and 255 characters"))]
    pub slug: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "Content cannot be empty"))]
    pub content: Option<String>,
    #[serde(default)]
    pub excerpt: Patch<String>,
    #[serde(default)]
    pub cover_image_url: Patch<String>,
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Query string of the post listing endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ListPostsQuery {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default, alias = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub detail: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [PostStatus::Draft, PostStatus::Published, PostStatus::Archived] {
            assert_eq!(s.as_str().parse::<PostStatus>().unwrap(), s);
        }
        assert!("deleted".parse::<PostStatus>().is_err());
    }

    #[test]
    fn test_update_request_distinguishes_null_category() {
        let detach: UpdatePostRequest = serde_json::from_str(r#"{"category_id": null}"#).unwrap();
        assert_eq!(detach.category_id, Patch::Null);
        assert!(detach.title.is_none());

        let untouched: UpdatePostRequest = serde_json::from_str(r#"{"title": "New"}"#).unwrap();
        assert_eq!(untouched.category_id, Patch::Missing);
        assert_eq!(untouched.title.as_deref(), Some("New"));
    }

    #[test]
    fn test_post_view_flattens_post_fields() {
        let now = Utc::now();
        let view = PostView {
            post: Post {
                id: 1,
                category_id: None,
                author_id: 1,
                title: "t".into(),
                slug: "t".into(),
                content: "c".into(),
                excerpt: String::new(),
                cover_image_url: String::new(),
                status: "draft".into(),
                view_count: 0,
                published_at: None,
                created_at: now,
                updated_at: now,
            },
            category: None,
            tags: vec![],
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["slug"], "t");
        assert!(json.get("category").is_none());
        assert!(json["published_at"].is_null());
    }
}
