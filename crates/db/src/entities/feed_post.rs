//! Feed post entity (needs, supplies, updates and stories).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Post classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    /// A request for help.
    #[sea_orm(string_value = "need")]
    Need,
    /// An offer of help.
    #[sea_orm(string_value = "supply")]
    Supply,
    /// A progress update.
    #[sea_orm(string_value = "update")]
    Update,
    /// A free-form story.
    #[sea_orm(string_value = "story")]
    Story,
}

impl PostType {
    /// Whether the economic fields (amounts, beneficiaries, urgency) carry meaning.
    #[must_use]
    pub const fn has_economics(self) -> bool {
        matches!(self, Self::Need | Self::Supply)
    }
}

/// Urgency of a need or supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "critical")]
    Critical,
}

/// Result of the external moderation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "feed_posts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Author user ID
    #[sea_orm(indexed)]
    pub user_id: String,

    pub post_type: PostType,

    #[sea_orm(nullable)]
    pub title: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,

    /// Attached media. Either plain URL strings or `{url, type}` objects.
    #[sea_orm(column_type = "JsonBinary")]
    pub media_urls: Json,

    #[sea_orm(nullable)]
    pub category: Option<String>,

    /// Free-text location label
    #[sea_orm(nullable)]
    pub location: Option<String>,

    #[sea_orm(nullable)]
    pub region_code: Option<String>,

    #[sea_orm(nullable)]
    pub latitude: Option<f64>,

    #[sea_orm(nullable)]
    pub longitude: Option<f64>,

    /// Weak reference to a campaign (lookup only)
    #[sea_orm(nullable)]
    pub campaign_id: Option<String>,

    #[sea_orm(nullable)]
    pub target_amount: Option<i64>,

    /// Updated by external settlement only; never decreases
    #[sea_orm(default_value = 0)]
    pub fulfilled_amount: i64,

    #[sea_orm(nullable)]
    pub beneficiaries_count: Option<i32>,

    #[sea_orm(nullable)]
    pub urgency: Option<Urgency>,

    #[sea_orm(default_value = false)]
    pub is_matched: bool,

    #[sea_orm(nullable)]
    pub matched_post_id: Option<String>,

    pub moderation_status: ModerationStatus,

    /// Soft-delete flag
    #[sea_orm(default_value = true)]
    pub is_active: bool,

    #[sea_orm(nullable)]
    pub expires_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether general feed reads may return this post.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.is_active && self.moderation_status == ModerationStatus::Approved
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::UserId",
        to = "super::profile::Column::Id"
    )]
    Author,

    #[sea_orm(has_many = "super::feed_reaction::Entity")]
    Reactions,

    #[sea_orm(has_many = "super::feed_comment::Entity")]
    Comments,
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::feed_reaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reactions.def()
    }
}

impl Related<super::feed_comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
