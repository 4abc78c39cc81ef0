//! Shopfront server library.
//!
//! The HTTP backend of the shop: bearer sessions, the inventory ledger, order
//! fulfillment and the admin audit trail. Exposed as a library so the CLI
//! and the integration tests can build the same services and router.
//!
//! # Layers
//!
//! - [`store`] - storage capability traits, `Backend` bundle, in-memory fake
//! - [`db`] - `PostgreSQL` implementations of the store traits
//! - [`services`] - business rules over the store traits
//! - [`routes`], [`middleware`] - the axum surface
//! - [`scheduler`] - background token sweeper

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod store;
