//! LinkMe order persistence.
//!
//! Implements the [`orders::OrderRepository`] port twice:
//!
//! - [`PgOrderRepository`]: Postgres via `tokio-postgres`, pooled by
//!   `deadpool-postgres`. Orders, lines and the status history live in three
//!   tables created by [`migrate`]. LinkMe
//!   details and the open info request are JSONB columns; the info-request
//!   token hash is also a unique column so public links resolve by index.
//! - [`MemoryOrderRepository`]: process-local maps for tests and local runs.
//!
//! Both apply a transition only if the stored status still equals the
//! transition's `from` status, so two staff members acting on the same order
//! cannot both win.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. SQL, row
//! mapping and connection handling live here; the [`orders`] crate sees only
//! [`orders::OrderRepository`].

mod error;
mod memory;
mod migrate;
mod postgres;

pub use error::StoreError;
pub use memory::MemoryOrderRepository;
pub use migrate::{migrate, Migration, MIGRATIONS};
pub use postgres::PgOrderRepository;
