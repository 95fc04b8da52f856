//! Built-in commands and observers for feedsync.
//!
//! [`builtin_registry`] returns a registry holding every feed backend,
//! command and observer shipped with feedsync.

pub mod commands;
pub mod observers;

use feedsync_core::Registry;

/// Registry with the directory feed, all built-in commands and all built-in observers.
pub fn builtin_registry() -> Registry {
    let mut registry = Registry::new();
    feedsync_feeds::register_feeds(&mut registry);
    commands::register_commands(&mut registry);
    observers::register_observers(&mut registry, reqwest::Client::new());
    registry
}
