//! TestVault Server - API for versioned test artifacts
//!
//! This crate provides the REST API server that stores generated test code
//! as per-user, append-only version histories.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;

pub use error::AppError;
pub use routes::{create_router, AppState};
