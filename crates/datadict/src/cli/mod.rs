//! CLI command modules for datadict.
//!
//! Each subcommand lives in its own module; shared plumbing (path
//! resolution, segment discovery, table output, confirmation gates, and the
//! continue-on-error apply loop) is factored out beside them.

pub mod apply;
pub mod config;
pub mod error;
pub mod output;
pub mod review;
pub mod rollback;
pub mod segments;
pub mod validate;
pub mod writeback;

#[allow(unused_imports)]
pub use error::HelpfulError;
