//! Feed reaction entity (one emotive response per user per post).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "feed_reactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The post being reacted to
    pub post_id: String,

    /// The user who reacted
    pub user_id: String,

    /// Reaction token, e.g. "like", "love", "haha"
    pub reaction_type: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::feed_post::Entity",
        from = "Column::PostId",
        to = "super::feed_post::Column::Id",
        on_delete = "Cascade"
    )]
    Post,
}

impl Related<super::feed_post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
