//! Bundle of the external collaborators every service talks to.

use std::sync::Arc;

use fun_common::StorageBackend;
use fun_db::repositories::{
    CommentRepository, PostRepository, ProfileRepository, ReactionRepository,
};
use fun_db::{CommentStore, PostStore, ProfileStore, ReactionStore};
use sea_orm::DatabaseConnection;
use tracing::warn;

use super::cache::FeedCache;
use super::change::{ChangeEvent, ChangePublisherService, NoOpChangePublisher};
use super::functions::{FunctionInvokerService, NoOpFunctionInvoker};
use super::moderation::{DEFAULT_MODERATION_FUNCTION, ModerationGate};

/// Store ports, storage, functions, change publisher and feed cache.
///
/// Cheap to clone; services are built from a gateway plus a session.
#[derive(Clone)]
pub struct DataGateway {
    pub posts: Arc<dyn PostStore>,
    pub reactions: Arc<dyn ReactionStore>,
    pub comments: Arc<dyn CommentStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub storage: Arc<dyn StorageBackend>,
    pub functions: FunctionInvokerService,
    pub publisher: ChangePublisherService,
    pub cache: Arc<FeedCache>,
    moderation_function: String,
}

impl DataGateway {
    /// Create a gateway with no function host, no change publisher and an
    /// empty cache.
    #[must_use]
    pub fn new(
        posts: Arc<dyn PostStore>,
        reactions: Arc<dyn ReactionStore>,
        comments: Arc<dyn CommentStore>,
        profiles: Arc<dyn ProfileStore>,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            posts,
            reactions,
            comments,
            profiles,
            storage,
            functions: Arc::new(NoOpFunctionInvoker),
            publisher: Arc::new(NoOpChangePublisher),
            cache: Arc::new(FeedCache::new()),
            moderation_function: DEFAULT_MODERATION_FUNCTION.to_string(),
        }
    }

    /// Create a gateway backed by the Postgres repositories.
    #[must_use]
    pub fn from_connection(db: Arc<DatabaseConnection>, storage: Arc<dyn StorageBackend>) -> Self {
        Self::new(
            Arc::new(PostRepository::new(Arc::clone(&db))),
            Arc::new(ReactionRepository::new(Arc::clone(&db))),
            Arc::new(CommentRepository::new(Arc::clone(&db))),
            Arc::new(ProfileRepository::new(db)),
            storage,
        )
    }

    /// Use a function invoker and moderation function name.
    #[must_use]
    pub fn with_functions(
        mut self,
        functions: FunctionInvokerService,
        moderation_function: impl Into<String>,
    ) -> Self {
        self.functions = functions;
        self.moderation_function = moderation_function.into();
        self
    }

    /// Use a change publisher.
    #[must_use]
    pub fn with_publisher(mut self, publisher: ChangePublisherService) -> Self {
        self.publisher = publisher;
        self
    }

    /// Share a feed cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<FeedCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Moderation gate over the configured function invoker.
    #[must_use]
    pub fn moderation(&self) -> ModerationGate {
        ModerationGate::new(Arc::clone(&self.functions), self.moderation_function.clone())
    }

    /// Publish a change, logging failures instead of failing the write.
    pub async fn announce(&self, event: ChangeEvent) {
        if let Err(e) = self.publisher.publish(&event).await {
            warn!(
                error = %e,
                table = %event.table,
                record_id = %event.record_id,
                "Failed to publish change event"
            );
        }
    }
}
