mod error;
pub mod loader;
mod types;

pub use error::ConfigError;
pub use loader::{load_section, Document, Section};
pub use types::*;
