//! ## Crate layout
//! - `core`: vault, guards, grammar registry, compiler pipeline and the
//!   predicate backends.
//! - `config`: TOML loading for compiler settings.
//!
//! The `prelude` module re-exports what a caller needs to compile a query
//! and run the resulting predicate over JSON records.

pub use siftql_core as core;

pub mod config;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use crate::config::{ConfigError, load_settings, settings_from_toml_str};
    pub use crate::core::prelude::*;
}
