pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load, load_from_str};
pub use types::{CoreConfig, DataSourceSettings};
