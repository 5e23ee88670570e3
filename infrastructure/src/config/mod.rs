//! Configuration file loading for blockhand
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. Environment: `BLOCKHAND_<SECTION>__<KEY>`
//! 2. `--config <path>` specified file
//! 3. Project root: `./blockhand.toml` or `./.blockhand.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/blockhand/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    FileAgentConfig, FileBehaviorConfig, FileConfig, FileDelegationConfig, FileLoggingConfig,
    FilePeerConfig, FileRegistryConfig, FileSessionConfig, FileSimulationConfig, FileTreeConfig,
    FileWatchdogConfig,
};
pub use loader::{ConfigError, ConfigLoader};
