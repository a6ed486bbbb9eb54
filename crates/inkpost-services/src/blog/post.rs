use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use inkpost_core::models::{CreatePostRequest, ListPostsQuery, Post, PostStatus, PostView, Tag, UpdatePostRequest};
use inkpost_core::pagination::{finish_page, plan, Filters, Page, PagePlan};
use inkpost_core::validation::{validate_slug, validate_title};
use inkpost_core::AppError;
use inkpost_db::{CategoryRepository, PostRepository, TagRepository};

use crate::cache::{get_or_load, Cache};

pub const LIST_CACHE_PATTERN: &str = "posts:list:*";
const DETAIL_CACHE_PATTERN: &str = "post:detail:*";

pub fn detail_cache_key(id: i64) -> String {
    format!("post:detail:{}", id)
}

/// Cache key of a listing. Built from the resolved plan so equivalent
/// queries (`order=DESC` and `order=desc`, say) share an entry.
fn list_cache_key(plan: &PagePlan, cursor: &str, detail: bool) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{:?}|{:?}|{:?}|{}|{}|{}|{}",
        plan.filters.status,
        plan.filters.category_slug,
        plan.filters.tag_slug,
        plan.sort_field,
        plan.order.as_sql(),
        cursor,
        plan.limit,
    ));
    hasher.update(if detail { "|full" } else { "|summary" });
    format!("posts:list:{}", hex::encode(hasher.finalize()))
}

/// Apply a partial update to `post`. Tags are handled by the caller.
fn merge_update(mut post: Post, req: UpdatePostRequest, now: DateTime<Utc>) -> Post {
    if let Some(category_id) = req.category_id.into_update() {
        post.category_id = category_id;
    }
    if let Some(title) = req.title {
        post.title = title;
    }
    if let Some(slug) = req.slug {
        post.slug = slug;
    }
    if let Some(content) = req.content {
        post.content = content;
    }
    if let Some(excerpt) = req.excerpt.into_update() {
        post.excerpt = excerpt.unwrap_or_default();
    }
    if let Some(cover) = req.cover_image_url.into_update() {
        post.cover_image_url = cover.unwrap_or_default();
    }
    if let Some(status) = req.status {
        post.status = status.as_str().to_string();
    }
    if post.is_published() && post.published_at.is_none() {
        post.published_at = Some(now);
    }
    post
}

#[derive(Clone)]
pub struct PostService {
    posts: PostRepository,
    categories: CategoryRepository,
    tags: TagRepository,
    cache: Option<Arc<dyn Cache>>,
    cache_ttl: Duration,
}

impl PostService {
    pub fn new(posts: PostRepository, categories: CategoryRepository, tags: TagRepository) -> Self {
        Self {
            posts,
            categories,
            tags,
            cache: None,
            cache_ttl: Duration::from_secs(300),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    /// One page of posts. Anonymous callers only ever see published posts,
    /// whatever `status` they ask for.
    #[tracing::instrument(skip(self, query), fields(sort_by = ?query.sort_by))]
    pub async fn list(
        &self,
        query: &ListPostsQuery,
        authenticated: bool,
    ) -> Result<Page<PostView>, AppError> {
        let status = if authenticated {
            match query.status.as_deref() {
                None | Some("") => None,
                Some(raw) => Some(
                    PostStatus::from_str(raw)
                        .map_err(|e| AppError::InvalidInput(e.to_string()))?
                        .as_str()
                        .to_string(),
                ),
            }
        } else {
            Some(PostStatus::Published.as_str().to_string())
        };

        let filters = Filters {
            status,
            category_slug: query.category.clone().filter(|s| !s.is_empty()),
            tag_slug: query.tag.clone().filter(|s| !s.is_empty()),
        };
        let cursor = query.cursor.as_deref().unwrap_or("");
        let plan = plan(
            filters,
            query.sort_by.as_deref().unwrap_or(""),
            query.order.as_deref().unwrap_or(""),
            cursor,
            query.limit,
        )?;
        let full_content = query.detail != Some(0);

        let key = list_cache_key(&plan, cursor, full_content);
        get_or_load(self.cache.as_deref(), &key, self.cache_ttl, || async {
            let rows = self.posts.fetch_page(&plan).await?;
            let page = finish_page(rows, &plan)?;
            let mut data = self.attach(page.data).await?;
            if !full_content {
                for view in &mut data {
                    view.post.content.clear();
                }
            }
            Ok(Page {
                data,
                next_cursor: page.next_cursor,
                prev_cursor: None,
                has_more: page.has_more,
                limit: page.limit,
            })
        })
        .await
    }

    /// A single post with category and tags. Counts as a view.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: i64, authenticated: bool) -> Result<PostView, AppError> {
        let key = detail_cache_key(id);
        let mut view = get_or_load(self.cache.as_deref(), &key, self.cache_ttl, || async {
            let post = self
                .posts
                .get(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))?;
            self.attach_one(post).await
        })
        .await?;

        if !view.post.is_published() && !authenticated {
            return Err(AppError::Forbidden(
                "This post is not published".to_string(),
            ));
        }

        // the count is best effort; a failed bump does not fail the read
        match self.posts.increment_view_count(id).await {
            Ok(()) => view.post.view_count += 1,
            Err(e) => tracing::warn!(error = %e, post_id = id, "Failed to increment view count"),
        }

        Ok(view)
    }

    #[tracing::instrument(skip(self, req), fields(slug = %req.slug))]
    pub async fn create(&self, author_id: i64, req: CreatePostRequest) -> Result<PostView, AppError> {
        validate_title(&req.title)?;
        validate_slug(&req.slug)?;
        if self.posts.slug_taken(&req.slug, None).await? {
            return Err(AppError::Conflict(format!("Slug '{}' is already in use", req.slug)));
        }
        if let Some(category_id) = req.category_id {
            self.ensure_category(category_id).await?;
        }
        let tag_ids = self.resolve_tags(&req.tags).await?;

        let now = Utc::now();
        let post = Post {
            id: 0,
            category_id: req.category_id,
            author_id,
            title: req.title,
            slug: req.slug,
            content: req.content,
            excerpt: req.excerpt,
            cover_image_url: req.cover_image_url,
            status: req.status.as_str().to_string(),
            view_count: 0,
            published_at: (req.status == PostStatus::Published).then_some(now),
            created_at: now,
            updated_at: now,
        };

        let created = self
            .posts
            .create(&post, &tag_ids)
            .await
            .map_err(|e| slug_conflict(e, &post.slug))?;
        self.invalidate(None).await;

        tracing::info!(post_id = created.id, "Post created");
        self.attach_one(created).await
    }

    #[tracing::instrument(skip(self, req))]
    pub async fn update(&self, id: i64, mut req: UpdatePostRequest) -> Result<PostView, AppError> {
        let current = self
            .posts
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))?;

        if let Some(title) = &req.title {
            validate_title(title)?;
        }
        if let Some(slug) = &req.slug {
            validate_slug(slug)?;
            if self.posts.slug_taken(slug, Some(id)).await? {
                return Err(AppError::Conflict(format!("Slug '{}' is already in use", slug)));
            }
        }
        if let Some(category_id) = req.category_id.as_ref().value() {
            self.ensure_category(*category_id).await?;
        }
        let tag_ids = match req.tags.take() {
            Some(slugs) => Some(self.resolve_tags(&slugs).await?),
            None => None,
        };

        let post = merge_update(current, req, Utc::now());
        let saved = self
            .posts
            .save(&post, tag_ids.as_deref())
            .await
            .map_err(|e| slug_conflict(e, &post.slug))?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))?;
        self.invalidate(Some(id)).await;

        self.attach_one(saved).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        if !self.posts.delete(id).await? {
            return Err(AppError::NotFound(format!("Post {} not found", id)));
        }
        self.invalidate(Some(id)).await;
        Ok(())
    }

    /// Drop cached listings, and the detail of `id` when given. Category and
    /// tag writes call this too since listings embed them.
    pub async fn invalidate(&self, id: Option<i64>) {
        let Some(cache) = &self.cache else {
            return;
        };
        if let Some(id) = id {
            cache.delete(&detail_cache_key(id)).await;
        }
        cache.delete_by_pattern(LIST_CACHE_PATTERN).await;
    }

    /// Drop every cached listing and detail. Used when a category or tag
    /// that posts embed is renamed or removed.
    pub async fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            cache.delete_by_pattern(DETAIL_CACHE_PATTERN).await;
            cache.delete_by_pattern(LIST_CACHE_PATTERN).await;
        }
    }

    async fn ensure_category(&self, id: i64) -> Result<(), AppError> {
        match self.categories.get(id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::InvalidInput(format!("Category {} does not exist", id))),
        }
    }

    /// Map tag slugs to ids; every slug must exist.
    async fn resolve_tags(&self, slugs: &[String]) -> Result<Vec<i64>, AppError> {
        let wanted: BTreeSet<&str> = slugs.iter().map(String::as_str).collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        let unique: Vec<String> = wanted.iter().map(|s| s.to_string()).collect();
        let found = self.tags.find_by_slugs(&unique).await?;

        let missing: Vec<&str> = wanted
            .iter()
            .copied()
            .filter(|slug| !found.iter().any(|t| t.slug == *slug))
            .collect();
        if !missing.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Unknown tags: {}",
                missing.join(", ")
            )));
        }

        Ok(found.into_iter().map(|t| t.id).collect())
    }

    async fn attach_one(&self, post: Post) -> Result<PostView, AppError> {
        self.attach(vec![post])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("Post vanished while loading relations".to_string()))
    }

    /// Batch-load categories and tags for a page of posts.
    async fn attach(&self, posts: Vec<Post>) -> Result<Vec<PostView>, AppError> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let category_ids: Vec<i64> = posts
            .iter()
            .filter_map(|p| p.category_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let categories: HashMap<i64, _> = self
            .categories
            .get_many(&category_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
        for row in self.tags.for_posts(&post_ids).await? {
            tags.entry(row.post_id).or_default().push(row.into());
        }

        Ok(posts
            .into_iter()
            .map(|post| PostView {
                category: post.category_id.and_then(|id| categories.get(&id).cloned()),
                tags: tags.remove(&post.id).unwrap_or_default(),
                post,
            })
            .collect())
    }
}

fn slug_conflict(err: AppError, slug: &str) -> AppError {
    if err.is_unique_violation() {
        AppError::Conflict(format!("Slug '{}' is already in use", slug))
    } else {
        err
    }
}
