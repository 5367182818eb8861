//! Layered configuration (defaults, TOML file, environment) and the CLI surface.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
