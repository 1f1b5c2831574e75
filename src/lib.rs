// Core modules
pub mod analysis;
pub mod cli;
pub mod config;
pub mod core;
pub mod infrastructure;
pub mod server;
