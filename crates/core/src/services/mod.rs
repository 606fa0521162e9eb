//! Business logic services.

#![allow(missing_docs)]

pub mod cache;
pub mod change;
pub mod comment;
pub mod feed;
pub mod functions;
pub mod gateway;
pub mod media;
pub mod moderation;
pub mod pagination;
pub mod post;
pub mod reaction;
pub mod realtime;
pub mod session;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{FeedCache, FeedCacheKey, FeedInvalidator, FeedMode};
pub use change::{
    ChangeEvent, ChangeFeed, ChangeKind, ChangePublisher, ChangePublisherService, ChangeTable,
    LocalChangeFeed, NoOpChangePublisher,
};
pub use comment::{AddCommentInput, CommentService, CommentThread, CommentView};
pub use feed::{
    AuthorSnippet, BOUNDED_PAGE_SIZE, FeedPage, FeedPostView, FeedService, INFINITE_PAGE_SIZE,
};
pub use functions::{
    FunctionInvoker, FunctionInvokerService, HttpFunctionInvoker, NoOpFunctionInvoker,
};
pub use gateway::DataGateway;
pub use media::{MediaKind, MediaReference, normalize_media};
pub use moderation::{DEFAULT_MODERATION_FUNCTION, ModerationGate, ModerationOutcome};
pub use pagination::{FetchOutcome, InfiniteFeed, SkipReason};
pub use post::{CreatePostInput, PostService, UpdatePostInput};
pub use reaction::ReactionService;
pub use realtime::{RealtimeSync, Subscription};
pub use session::SessionContext;
pub use upload::{MAX_UPLOAD_BYTES, MediaUploader, UploadProgress, UploadRequest, UploadTask};
