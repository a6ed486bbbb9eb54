use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    Pending,
    Approved,
    Spam,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentStatus::Pending => "pending",
            CommentStatus::Approved => "approved",
            CommentStatus::Spam => "spam",
        }
    }
}

impl FromStr for CommentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CommentStatus::Pending),
            "approved" => Ok(CommentStatus::Approved),
            "spam" => Ok(CommentStatus::Spam),
            _ => Err(anyhow::anyhow!("Invalid comment status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub content: String,
    #[serde(skip_serializing)]
    pub ip: String,
    pub status: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Top-level comment with its direct and nested replies flattened one level
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

impl CommentThread {
    /// Group a flat, chronologically ordered list into threads. Replies to
    /// replies are attached to their root comment; orphans (parent not in the
    /// list, e.g. still pending) are dropped.
    pub fn build(comments: Vec<Comment>) -> Vec<CommentThread> {
        use std::collections::HashMap;

        let mut root_of: HashMap<i64, i64> = HashMap::new();
        let mut threads: Vec<CommentThread> = Vec::new();
        let mut index: HashMap<i64, usize> = HashMap::new();

        for comment in comments {
            match comment.parent_id {
                None => {
                    root_of.insert(comment.id, comment.id);
                    index.insert(comment.id, threads.len());
                    threads.push(CommentThread {
                        comment,
                        replies: Vec::new(),
                    });
                }
                Some(parent) => {
                    let Some(&root) = root_of.get(&parent) else {
                        continue;
                    };
                    root_of.insert(comment.id, root);
                    if let Some(&pos) = index.get(&root) {
                        threads[pos].replies.push(comment);
                    }
                }
            }
        }

        threads
    }
}

/// Values for a new comment row
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub user_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub content: String,
    pub ip: String,
    pub status: CommentStatus,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 5000, message = "Content must be between 1 and 5000 characters"))]
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentStatusRequest {
    pub status: CommentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: i64, parent_id: Option<i64>) -> Comment {
        Comment {
            id,
            post_id: 1,
            user_id: None,
            name: "guest".into(),
            email: "guest@example.com".into(),
            content: format!("comment {}", id),
            ip: "127.0.0.1".into(),
            status: "approved".into(),
            parent_id,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_groups_nested_replies_under_root() {
        let threads = CommentThread::build(vec![
            comment(1, None),
            comment(2, Some(1)),
            comment(3, None),
            comment(4, Some(2)),
            comment(5, Some(99)),
        ]);
        assert_eq!(threads.len(), 2);
        assert_eq!(
            threads[0].replies.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![2, 4]
        );
        assert!(threads[1].replies.is_empty());
    }

    #[test]
    fn test_ip_is_not_serialized() {
        let json = serde_json::to_value(comment(1, None)).unwrap();
        assert!(json.get("ip").is_none());
    }
}
