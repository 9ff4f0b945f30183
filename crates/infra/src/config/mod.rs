//! Configuration loading
//!
//! Reads [`grocy_domain::GatewayConfig`] from environment variables and
//! files.

pub mod loader;

pub use loader::{
    apply_env_overrides, load, load_from_env, load_from_file, parse_config, probe_config_paths,
};
