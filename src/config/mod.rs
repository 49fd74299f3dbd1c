// Configuration management module
// TOML settings for the Ollama connection, retrieval and sessions

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{Config, ConfigError, OllamaConfig, RetrievalConfig, SessionConfig};

use std::path::{Path, PathBuf};

/// Resolve the configuration directory from an optional override
#[inline]
pub fn resolve_config_dir(override_dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match override_dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Config::default_dir(),
    }
}
