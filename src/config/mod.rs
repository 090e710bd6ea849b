//! Configuration module for Kumo
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files covering the fetch scheduler, the generate step, and crawler
//! identification.

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FetchConfig, GenerateConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
