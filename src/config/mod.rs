//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RefetchConfig (validated, immutable)
//!     → schema.rs to_patch → ConfigPatch over the factory defaults
//!     → Refetch::from_config
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The CLI applies its flags onto the parsed config before building

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ObservabilityConfig, RefetchConfig};
pub use validation::{validate_config, ValidationError};
