//! Create feed post table migration.

use sea_orm_migration::prelude::*;

use super::m20250601_000001_create_profile_table::Profile;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FeedPost::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FeedPost::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FeedPost::UserId).string_len(64).not_null())
                    .col(ColumnDef::new(FeedPost::PostType).string_len(16).not_null())
                    .col(ColumnDef::new(FeedPost::Title).string_len(512))
                    .col(ColumnDef::new(FeedPost::Content).text())
                    .col(
                        ColumnDef::new(FeedPost::MediaUrls)
                            .json_binary()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(FeedPost::Category).string_len(64))
                    .col(ColumnDef::new(FeedPost::Location).string_len(256))
                    .col(ColumnDef::new(FeedPost::RegionCode).string_len(16))
                    .col(ColumnDef::new(FeedPost::Latitude).double())
                    .col(ColumnDef::new(FeedPost::Longitude).double())
                    .col(ColumnDef::new(FeedPost::CampaignId).string_len(64))
                    .col(ColumnDef::new(FeedPost::TargetAmount).big_integer())
                    .col(
                        ColumnDef::new(FeedPost::FulfilledAmount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(FeedPost::BeneficiariesCount).integer())
                    .col(ColumnDef::new(FeedPost::Urgency).string_len(16))
                    .col(
                        ColumnDef::new(FeedPost::IsMatched)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(FeedPost::MatchedPostId).string_len(32))
                    .col(
                        ColumnDef::new(FeedPost::ModerationStatus)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(FeedPost::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(FeedPost::ExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(FeedPost::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(FeedPost::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_feed_post_user")
                            .from(FeedPost::Table, FeedPost::UserId)
                            .to(Profile::Table, Profile::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: feed reads (visible posts, newest first)
        manager
            .create_index(
                Index::create()
                    .name("idx_feed_post_visible_created")
                    .table(FeedPost::Table)
                    .col(FeedPost::IsActive)
                    .col(FeedPost::ModerationStatus)
                    .col(FeedPost::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index: post_type filter
        manager
            .create_index(
                Index::create()
                    .name("idx_feed_post_type_created")
                    .table(FeedPost::Table)
                    .col(FeedPost::PostType)
                    .col(FeedPost::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index: user_id (author's posts)
        manager
            .create_index(
                Index::create()
                    .name("idx_feed_post_user_id")
                    .table(FeedPost::Table)
                    .col(FeedPost::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FeedPost::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum FeedPost {
    #[iden = "feed_posts"]
    Table,
    Id,
    UserId,
    PostType,
    Title,
    Content,
    MediaUrls,
    Category,
    Location,
    RegionCode,
    Latitude,
    Longitude,
    CampaignId,
    TargetAmount,
    FulfilledAmount,
    BeneficiariesCount,
    Urgency,
    IsMatched,
    MatchedPostId,
    ModerationStatus,
    IsActive,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}
