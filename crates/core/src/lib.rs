//! Core business logic for FUN Charity.
//!
//! The feed query layer, the mutation layer and realtime cache invalidation,
//! all written against the store ports in [`fun_db::gateway`].

pub mod services;

pub use services::*;
