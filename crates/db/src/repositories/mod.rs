//! Repository layer for database operations.

mod comment;
mod post;
mod profile;
mod reaction;

use std::collections::HashMap;

use sea_orm::FromQueryResult;

pub use comment::CommentRepository;
pub use post::PostRepository;
pub use profile::ProfileRepository;
pub use reaction::ReactionRepository;

/// One row of a `GROUP BY post_id` count.
#[derive(Debug, FromQueryResult)]
struct PostCount {
    post_id: String,
    count: i64,
}

impl PostCount {
    fn into_map(rows: Vec<Self>) -> HashMap<String, u64> {
        rows.into_iter()
            .map(|r| (r.post_id, u64::try_from(r.count).unwrap_or(0)))
            .collect()
    }
}
