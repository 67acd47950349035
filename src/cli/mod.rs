//! CLI module
//!
//! Thin command layer over [`crate::http::ApiClient`].
//!
//! # Commands
//!
//! - `token` - Authenticate and show the granted shops
//! - `get` - Fetch a single resource
//! - `list` - Fetch a paginated collection

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
