//! Configuration snapshot and loading.

pub mod loader;
pub mod pool;

pub use loader::{
    apply_env_overrides, load, load_properties_file, parse_properties, LoadError, DEFAULT_CONFIG_FILE, ENV_PREFIX,
};
pub use pool::{keys, PoolConfiguration, ThreadPoolType};
