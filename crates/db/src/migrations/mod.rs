//! Database migrations.
//!
//! Schema migrations for the feed tables.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250601_000001_create_profile_table;
mod m20250601_000002_create_feed_post_table;
mod m20250601_000003_create_feed_reaction_table;
mod m20250601_000004_create_feed_comment_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_profile_table::Migration),
            Box::new(m20250601_000002_create_feed_post_table::Migration),
            Box::new(m20250601_000003_create_feed_reaction_table::Migration),
            Box::new(m20250601_000004_create_feed_comment_table::Migration),
        ]
    }
}
