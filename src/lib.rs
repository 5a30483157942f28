//! Inkpress - blog backend accounts and authentication
//!
//! Registration with email confirmation, login with signed session
//! credentials, password reset and role-gated account management over a
//! JSON HTTP API.

pub mod app;
pub mod core;
