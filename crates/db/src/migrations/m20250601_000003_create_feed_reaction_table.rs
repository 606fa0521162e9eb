//! Create feed reaction table migration.

use sea_orm_migration::prelude::*;

use super::m20250601_000002_create_feed_post_table::FeedPost;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FeedReaction::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FeedReaction::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FeedReaction::PostId).string_len(32).not_null())
                    .col(ColumnDef::new(FeedReaction::UserId).string_len(64).not_null())
                    .col(
                        ColumnDef::new(FeedReaction::ReactionType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FeedReaction::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_feed_reaction_post")
                            .from(FeedReaction::Table, FeedReaction::PostId)
                            .to(FeedPost::Table, FeedPost::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (post_id, user_id) - one reaction per user per post
        manager
            .create_index(
                Index::create()
                    .name("idx_feed_reaction_post_user")
                    .table(FeedReaction::Table)
                    .col(FeedReaction::PostId)
                    .col(FeedReaction::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: user_id (viewer reaction lookups)
        manager
            .create_index(
                Index::create()
                    .name("idx_feed_reaction_user_id")
                    .table(FeedReaction::Table)
                    .col(FeedReaction::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FeedReaction::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum FeedReaction {
    #[iden = "feed_reactions"]
    Table,
    Id,
    PostId,
    UserId,
    ReactionType,
    CreatedAt,
}
