//! Clip Core - clipboard history engine
//!
//! Records distinct clipboard values into a bounded history (LRU+LFU
//! eviction, locking, tags, near-duplicate folding) and reconciles the
//! system clipboard against it on every poll.
//!
//! Storage goes through the `Repository` trait: SQLite (rusqlite + r2d2) in
//! production, an in-memory map in tests.

pub mod config;
pub mod controller;
pub mod daemon;
pub mod database;
pub mod events;
pub mod history;
pub mod interface;
pub mod models;
pub mod provider;
pub mod repository;
pub mod similarity;

pub use controller::{ClipboardController, ControllerSettings};
pub use history::HistoryStore;
pub use interface::*;
pub use models::Entry;
