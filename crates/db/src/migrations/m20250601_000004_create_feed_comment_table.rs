//! Create feed comment table migration.

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
                    .table(FeedComment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FeedComment::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FeedComment::PostId).string_len(32).not_null())
                    .col(ColumnDef::new(FeedComment::UserId).string_len(64).not_null())
                    .col(ColumnDef::new(FeedComment::ParentCommentId).string_len(32))
                    .col(ColumnDef::new(FeedComment::Content).text())
                    .col(ColumnDef::new(FeedComment::ImageUrl).string_len(1024))
                    .col(
                        ColumnDef::new(FeedComment::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_feed_comment_post")
                            .from(FeedComment::Table, FeedComment::PostId)
                            .to(FeedPost::Table, FeedPost::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_feed_comment_parent")
                            .from(FeedComment::Table, FeedComment::ParentCommentId)
                            .to(FeedComment::Table, FeedComment::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (post_id, created_at) for comment threads
        manager
            .create_index(
                Index::create()
                    .name("idx_feed_comment_post_created")
                    .table(FeedComment::Table)
                    .col(FeedComment::PostId)
                    .col(FeedComment::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FeedComment::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum FeedComment {
    #[iden = "feed_comments"]
    Table,
    Id,
    PostId,
    UserId,
    ParentCommentId,
    Content,
    ImageUrl,
    CreatedAt,
}
