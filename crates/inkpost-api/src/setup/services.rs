//! Service wiring: repositories, the delete pipeline, cache and the
//! background tasks that run next to the HTTP server.

use inkpost_core::{Config, QueueBackend};
use inkpost_db::{
    CategoryRepository, CommentRepository, MediaRepository, PostRepository, SettingRepository,
    StreamRepository, TagRepository, UserRepository,
};
use inkpost_infra::{
    spawn_bucket_eviction, CommentLimits, CommentRateLimiter, EvictExpired, HttpRateLimiter,
};
use inkpost_services::{
    Cache, CommentService, MediaService, MemoryCache, OrphanSweep, PostService, SweepScheduler,
};
use inkpost_storage::Storage;
use inkpost_worker::{
    ConsumerConfig, DeleteConsumer, FileDeleteQueue, MemoryStreamBroker, PgStreamBroker,
    QueueMetrics, RetryPolicy, StreamBroker, DELETE_GROUP, DELETE_STREAM,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::JwtService;
use crate::constants::RATE_LIMIT_EVICTION_SECS;
use crate::state::{AppState, AuthState, BlogState, DatabaseState};

/// Capacity of the revoked-token cache
const REVOKED_TOKEN_CAPACITY: usize = 10_000;

/// Pieces shared by the state and the background tasks
pub struct Components {
    pub state: Arc<AppState>,
    pub storage: Arc<dyn Storage>,
    pub broker: Option<Arc<dyn StreamBroker>>,
    pub comment_limiter: Arc<CommentRateLimiter>,
}

/// Build the broker selected by `QUEUE_BACKEND` and make sure its consumer
/// group exists. A broker that cannot be prepared is dropped, so every
/// publish takes the in-process path instead.
pub async fn setup_broker(config: &Config, pool: &PgPool) -> Option<Arc<dyn StreamBroker>> {
    let broker: Arc<dyn StreamBroker> = match config.queue_backend() {
        QueueBackend::Postgres => Arc::new(PgStreamBroker::new(StreamRepository::new(pool.clone()))),
        QueueBackend::Memory => Arc::new(MemoryStreamBroker::new()),
        QueueBackend::None => {
            tracing::warn!("No delete queue backend configured, file deletes run in-process");
            return None;
        }
    };

    match broker.ensure_group(DELETE_STREAM, DELETE_GROUP).await {
        Ok(()) => {
            tracing::info!(backend = broker.name(), "Delete queue ready");
            Some(broker)
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                backend = broker.name(),
                "Delete queue unavailable, file deletes run in-process"
            );
            None
        }
    }
}

/// Initialize all services and repositories
pub fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
    broker: Option<Arc<dyn StreamBroker>>,
) -> Components {
    let metrics = Arc::new(QueueMetrics::default());
    let delete_queue = FileDeleteQueue::new(
        broker.clone(),
        storage.clone(),
        RetryPolicy::default(),
        metrics,
    );

    let mut posts = PostService::new(
        PostRepository::new(pool.clone()),
        CategoryRepository::new(pool.clone()),
        TagRepository::new(pool.clone()),
    );
    if config.cache_enabled() {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new(config.cache_capacity()));
        posts = posts.with_cache(cache, Duration::from_secs(config.cache_ttl_secs()));
        tracing::info!(
            capacity = config.cache_capacity(),
            ttl_secs = config.cache_ttl_secs(),
            "Post cache enabled"
        );
    }

    let comments = CommentService::new(
        CommentRepository::new(pool.clone()),
        PostRepository::new(pool.clone()),
    );
    let media = MediaService::new(
        MediaRepository::new(pool.clone()),
        storage.clone(),
        delete_queue.clone(),
        config.max_file_size_bytes(),
        config.allowed_extensions().to_vec(),
    );
    let comment_limiter = Arc::new(CommentRateLimiter::new(CommentLimits::default()));

    let users = UserRepository::new(pool.clone());
    let auth = Arc::new(AuthState {
        jwt: JwtService::new(config.jwt_secret(), config.jwt_expiry_hours()),
        users: users.clone(),
        revoked: Arc::new(MemoryCache::new(REVOKED_TOKEN_CAPACITY)),
    });

    let state = Arc::new(AppState {
        db: DatabaseState {
            pool: pool.clone(),
            categories: CategoryRepository::new(pool.clone()),
            tags: TagRepository::new(pool.clone()),
            settings: SettingRepository::new(pool.clone()),
            users,
        },
        blog: BlogState {
            posts,
            comments,
            media,
            comment_limiter: comment_limiter.clone(),
        },
        auth,
        delete_queue,
        http_rate_limiter: Arc::new(HttpRateLimiter::new(config.http_rate_limit_per_minute())),
        config: config.clone(),
        is_production: config.is_production(),
    });

    Components {
        state,
        storage,
        broker,
        comment_limiter,
    }
}

/// Spawn the delete consumer, the orphan sweep and rate limiter eviction.
/// All of them stop when `cancel` fires.
pub fn start_background_tasks(
    config: &Config,
    components: &Components,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    let state = &components.state;
    let mut handles = Vec::new();

    if let Some(broker) = &components.broker {
        let consumer = DeleteConsumer::new(
            broker.clone(),
            components.storage.clone(),
            RetryPolicy::default(),
            state.delete_queue.metrics().clone(),
            ConsumerConfig::new(config.delete_queue_consumer()),
        );
        handles.push(consumer.spawn(cancel.child_token()));
        tracing::info!(
            consumer = %config.delete_queue_consumer(),
            backend = broker.name(),
            "Delete queue consumer started"
        );
    }

    if config.scheduler_enabled() {
        let sweep = Arc::new(OrphanSweep::new(
            components.storage.root(),
            Arc::new(MediaRepository::new(state.db.pool.clone())),
            Duration::from_secs(config.sweep_min_age_secs()),
        ));
        let interval = Duration::from_secs(config.sweep_interval_secs());
        handles.push(SweepScheduler::new(sweep, interval).start(cancel.child_token()));
        tracing::info!(
            interval_secs = config.sweep_interval_secs(),
            min_age_secs = config.sweep_min_age_secs(),
            "Orphan file sweep scheduled"
        );
    }

    let limiters: Vec<Arc<dyn EvictExpired>> = vec![
        state.http_rate_limiter.clone(),
        components.comment_limiter.clone(),
    ];
    handles.push(spawn_bucket_eviction(
        limiters,
        Duration::from_secs(RATE_LIMIT_EVICTION_SECS),
        cancel.child_token(),
    ));

    handles
}
