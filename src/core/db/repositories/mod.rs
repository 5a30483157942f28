//! Credential store implementations
//!
//! The auth core depends only on the [`UserStore`] trait; the Postgres
//! repository backs production and the in-memory store backs tests and
//! database-less local runs.

pub mod memory;
pub mod user;

pub use memory::InMemoryUserStore;
pub use user::{StoreError, UserRepository, UserStore};
