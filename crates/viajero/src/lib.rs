//! Viajero: HTTP service and CLI wrapping the viajar test engine.
//!
//! The binary serves the dashboard API (`viajero serve`), loads the demo
//! step catalogs (`viajero seed`) and executes single cases from the
//! command line (`viajero run`). Catalogs and run results live in SQLite.

#![warn(missing_docs)]
// Lints are configured in the workspace Cargo.toml.

pub mod cli;
pub mod error;
pub mod routes;
pub mod store;

pub use cli::{Cli, Commands, RunArgs, ServeArgs};
pub use error::{ServeError, ServeResult};
pub use routes::{router, AppState};
pub use store::{CaseSummary, Store};
