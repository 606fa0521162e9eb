//! Fixtures shared by service tests.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use fun_common::{IdGenerator, LocalStorage};
use fun_db::entities::feed_post::{ModerationStatus, PostType};
use fun_db::entities::{feed_comment, feed_post, feed_reaction, profile};
use fun_db::test_utils::InMemoryGateway;

use super::gateway::DataGateway;

pub const MEDIA_BASE_URL: &str = "https://media.fun.test/files";

/// Gateway over an in-memory store and a throwaway storage directory.
pub fn gateway_with_memory() -> (DataGateway, Arc<InMemoryGateway>, PathBuf) {
    let memory = Arc::new(InMemoryGateway::new());
    let dir = std::env::temp_dir().join(format!("fun-core-{}", IdGenerator::new().generate()));
    let storage = Arc::new(LocalStorage::new(dir.clone(), MEDIA_BASE_URL.to_string()));

    let gateway = DataGateway::new(
        memory.clone(),
        memory.clone(),
        memory.clone(),
        memory.clone(),
        storage,
    );
    (gateway, memory, dir)
}

pub fn approved_post(id: &str, post_type: PostType, minutes_ago: i64) -> feed_post::Model {
    let at = (Utc::now() - Duration::minutes(minutes_ago)).into();
    feed_post::Model {
        id: id.to_string(),
        user_id: "author1".to_string(),
        post_type,
        title: Some(format!("Bài viết {id}")),
        content: Some("Nội dung".to_string()),
        media_urls: serde_json::json!([]),
        category: None,
        location: None,
        region_code: None,
        latitude: None,
        longitude: None,
        campaign_id: None,
        target_amount: None,
        fulfilled_amount: 0,
        beneficiaries_count: None,
        urgency: None,
        is_matched: false,
        matched_post_id: None,
        moderation_status: ModerationStatus::Approved,
        is_active: true,
        expires_at: None,
        created_at: at,
        updated_at: at,
    }
}

pub fn profile(id: &str) -> profile::Model {
    profile::Model {
        id: id.to_string(),
        full_name: Some(format!("Người dùng {id}")),
        avatar_url: None,
        is_verified: false,
        reputation_score: 10,
        created_at: Utc::now().into(),
    }
}

pub fn reaction(id: &str, post_id: &str, user_id: &str, kind: &str) -> feed_reaction::Model {
    feed_reaction::Model {
        id: id.to_string(),
        post_id: post_id.to_string(),
        user_id: user_id.to_string(),
        reaction_type: kind.to_string(),
        created_at: Utc::now().into(),
    }
}

pub fn comment(
    id: &str,
    post_id: &str,
    user_id: &str,
    parent: Option<&str>,
    minutes_ago: i64,
) -> feed_comment::Model {
    feed_comment::Model {
        id: id.to_string(),
        post_id: post_id.to_string(),
        user_id: user_id.to_string(),
        parent_comment_id: parent.map(str::to_string),
        content: Some(format!("Bình luận {id}")),
        image_url: None,
        created_at: (Utc::now() - Duration::minutes(minutes_ago)).into(),
    }
}
