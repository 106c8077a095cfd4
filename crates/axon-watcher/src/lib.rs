//! Axon Watcher — filesystem watch loop driving incremental re-indexing

pub mod watcher;

pub use watcher::{watch_repo, WatchOptions};
