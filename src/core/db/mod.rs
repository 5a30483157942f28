//! Database module for Inkpress
//!
//! This module provides database connectivity, the account model, and the
//! credential store implementations.

pub mod models;
pub mod pool;
pub mod repositories;

pub use models::*;
pub use pool::{DbConfig, DbError, create_pool, create_pool_with_migrations};
pub use repositories::{InMemoryUserStore, StoreError, UserRepository, UserStore};

pub use sqlx::PgPool;
