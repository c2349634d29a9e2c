//! Storage engine: the persistent array store.

mod store;

pub use store::{ArrayMeta, ArrayStore, CatalogEntry};
