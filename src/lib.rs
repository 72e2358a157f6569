//! Bookshelf gateway - REST CRUD surface for a book inventory backed by a
//! remote datasheet store.
//!
//! The store throttles aggressively, so every outbound call runs through a
//! bounded retry policy with exponential backoff; id-targeted mutations
//! confirm the record exists before writing; and a single classifier maps
//! all failures onto a stable JSON error contract.

pub mod books;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod store;
