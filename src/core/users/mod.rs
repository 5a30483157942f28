//! User account management

pub mod api;
pub mod service;

pub use api::{UsersApiState, users_api_router};
pub use service::{UpdatePasswordRequest, UserListResponse, UsersService};
