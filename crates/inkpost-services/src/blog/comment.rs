use inkpost_core::models::{
    Comment, CommentStatus, CommentThread, CreateCommentRequest, NewComment,
};
use inkpost_core::AppError;
use inkpost_db::{CommentRepository, PostRepository};

/// Signed-in commenter; their comments skip moderation.
#[derive(Debug, Clone)]
pub struct CommentAuthor {
    pub user_id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Clone)]
pub struct CommentService {
    comments: CommentRepository,
    posts: PostRepository,
}

impl CommentService {
    pub fn new(comments: CommentRepository, posts: PostRepository) -> Self {
        Self { comments, posts }
    }

    /// Approved comments of a post, grouped under their top-level comment.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentThread>, AppError> {
        self.require_post(post_id).await?;
        let comments = self.comments.list_approved(post_id).await?;
        Ok(CommentThread::build(comments))
    }

    #[tracing::instrument(skip(self, req, author), fields(parent_id = ?req.parent_id))]
    pub async fn create(
        &self,
        post_id: i64,
        req: CreateCommentRequest,
        author: Option<CommentAuthor>,
        ip: &str,
    ) -> Result<Comment, AppError> {
        let post = self.require_post(post_id).await?;
        if !post.is_published() && author.is_none() {
            return Err(AppError::Forbidden(
                "Comments are closed on unpublished posts".to_string(),
            ));
        }

        if let Some(parent_id) = req.parent_id {
            let parent = self
                .comments
                .get(parent_id)
                .await?
                .ok_or_else(|| AppError::InvalidInput(format!("Parent comment {} not found", parent_id)))?;
            if parent.post_id != post_id {
                return Err(AppError::InvalidInput(
                    "Parent comment belongs to another post".to_string(),
                ));
            }
        }

        let new_comment = match author {
            Some(author) => NewComment {
                post_id,
                user_id: Some(author.user_id),
                name: author.name,
                email: author.email,
                content: req.content,
                ip: ip.to_string(),
                status: CommentStatus::Approved,
                parent_id: req.parent_id,
            },
            None => {
                let name = req.name.map(|n| n.trim().to_string()).unwrap_or_default();
                let email = req.email.map(|e| e.trim().to_string()).unwrap_or_default();
                if name.is_empty() || email.is_empty() {
                    return Err(AppError::InvalidInput(
                        "Name and email are required for guest comments".to_string(),
                    ));
                }
                NewComment {
                    post_id,
                    user_id: None,
                    name,
                    email,
                    content: req.content,
                    ip: ip.to_string(),
                    status: CommentStatus::Pending,
                    parent_id: req.parent_id,
                }
            }
        };

        let comment = self.comments.create(&new_comment).await?;
        tracing::info!(comment_id = comment.id, status = %comment.status, "Comment created");
        Ok(comment)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, id: i64, status: CommentStatus) -> Result<Comment, AppError> {
        self.comments
            .update_status(id, status)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", id)))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        if self.comments.delete(id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Comment {} not found", id)))
        }
    }

    async fn require_post(&self, post_id: i64) -> Result<inkpost_core::models::Post, AppError> {
        self.posts
            .get(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))
    }
}
