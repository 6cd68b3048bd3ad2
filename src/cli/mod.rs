pub mod commands;

pub use commands::{build_once, serve, Cli, Commands};
