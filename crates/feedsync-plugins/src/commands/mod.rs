//! Built-in validation commands.
//!
//! | type               | settings     | fails when                              |
//! |--------------------|--------------|-----------------------------------------|
//! | `require_content`  |              | content is absent or empty              |
//! | `id_pattern`       | `pattern`    | the id does not match the regex         |
//! | `max_size`         | `max_bytes`  | content is larger than `max_bytes`      |
//! | `digest_blocklist` | `blocked`    | the content SHA-256 is on the blocklist |

mod digest_blocklist;
mod id_pattern;
mod max_size;
mod require_content;

use std::sync::Arc;

use feedsync_core::{Command, Registry};

pub use digest_blocklist::{sha256_hex, DigestBlocklistCommand};
pub use id_pattern::IdPatternCommand;
pub use max_size::MaxSizeCommand;
pub use require_content::RequireContentCommand;

pub fn register_commands(registry: &mut Registry) {
    registry
        .register_command(RequireContentCommand::TYPE, |settings| {
            Ok(Arc::new(RequireContentCommand::new(settings.clone())) as Arc<dyn Command>)
        })
        .register_command(IdPatternCommand::TYPE, |settings| {
            Ok(Arc::new(IdPatternCommand::from_settings(settings)?) as Arc<dyn Command>)
        })
        .register_command(MaxSizeCommand::TYPE, |settings| {
            Ok(Arc::new(MaxSizeCommand::from_settings(settings)?) as Arc<dyn Command>)
        })
        .register_command(DigestBlocklistCommand::TYPE, |settings| {
            Ok(Arc::new(DigestBlocklistCommand::from_settings(settings)?) as Arc<dyn Command>)
        });
}
