//! Core domain models and business logic for accounts and authentication

pub mod auth;
pub mod config;
pub mod db;
pub mod mail;
pub mod users;
pub mod validation;
