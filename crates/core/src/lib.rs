//! Shopfront Core - Shared domain types.
//!
//! This crate provides the types shared by every shopfront component:
//! - `server` - HTTP backend (catalog lookups, order fulfillment, admin)
//! - `cli` - Command-line tools for migrations, seeding and housekeeping
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no randomness. Anything that needs a clock, an RNG or a connection
//! lives in `shopfront-server`.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, money, order status rules and tracking IDs

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
