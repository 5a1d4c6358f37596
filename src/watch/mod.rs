// src/watch/mod.rs

//! File watching and change detection.
//!
//! Wires a `notify` watcher to [`Loader::invalidate`](crate::engine::Loader::invalidate).
//! Content hashes filter out events that did not change a source file.

pub mod cache;
pub mod event_handler;
pub mod path_utils;
pub mod watcher;

pub use cache::{Change, FileCache};
pub use event_handler::{WatchEvent, process_file_change};
pub use watcher::{WatcherHandle, spawn_watcher};
