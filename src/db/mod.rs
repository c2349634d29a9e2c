//! Database facade.

mod database;

pub use database::Database;
