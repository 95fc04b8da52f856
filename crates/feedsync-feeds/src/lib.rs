//! Package feed backends for feedsync.
//!
//! - [`DirectoryRepository`]: a flat directory of `<id>.<version>.nupkg` files

mod directory;

pub use directory::{parse_file_name, DirectoryRepository, PACKAGE_EXTENSION};

/// Registry type name of the directory feed.
pub const DIRECTORY_TYPE: &str = "directory";

/// Register every feed backend in this crate.
pub fn register_feeds(registry: &mut feedsync_core::Registry) {
    registry.register_repository(DIRECTORY_TYPE, |name, settings| {
        let repo = DirectoryRepository::from_settings(name, settings)?;
        Ok(std::sync::Arc::new(repo) as std::sync::Arc<dyn feedsync_core::Repository>)
    });
}
