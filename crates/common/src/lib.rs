//! Common utilities and shared types for FUN Charity.
//!
//! This crate provides foundational components used across all FUN Charity crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Storage**: Object storage backends for post and comment media
//!
//! # Example
//!
//! ```no_run
//! use fun_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {}", id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use storage::{
    LocalStorage, ProgressFn, StorageBackend, UPLOAD_CHUNK_BYTES, UploadedFile, generate_storage_key,
    is_valid_storage_key,
};
