//! Domain models for the shopfront backend.
//!
//! These are validated domain objects, separate from database row types
//! (see `crate::db`), and are what the services and routes pass around.

pub mod activity;
pub mod catalog;
pub mod order;
pub mod principal;
pub mod session;

pub use activity::{ActivityLog, AuditAction, NewActivity};
pub use catalog::{Category, NewCategory, NewProduct, Product};
pub use order::{CustomerInfo, NewOrder, NewOrderLine, Order, OrderItem, Page, PageRequest};
pub use principal::{NewPrincipal, Principal};
pub use session::SessionToken;
