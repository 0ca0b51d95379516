//! PostgreSQL persistence
//!
//! The engine's in-memory state is authoritative; these repositories mirror
//! it so reputation and warn history survive restarts. Flood windows and
//! other transient state are deliberately not persisted.

pub mod faq;
pub mod members;
pub mod pool;
pub mod warns;

pub use pool::DatabasePool;
