//! Configuration loading for the filesystem miner: compiled defaults, an
//! optional TOML file, and environment variable overrides, validated and
//! normalized into a single [`Config`].

pub mod loader;
pub mod model;
pub mod validation;
pub mod xdg;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader};
pub use model::{Config, SPECIAL_DIR_ALIASES};
pub use validation::{ConfigWarning, ConfigWarnings};
pub use xdg::XdgUserDirs;
