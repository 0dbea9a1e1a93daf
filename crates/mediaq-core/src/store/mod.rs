//! Persistent queue database (SQLite via sqlx).
//!
//! Stores recordings with their variants, queue items and their parts, and the
//! on-disk layout version. `save` rewrites the whole state in one transaction;
//! `load` reads it back and runs the layout migration once if needed.

mod db;
mod read;
mod write;

pub use db::{unix_timestamp, QueueDb};
