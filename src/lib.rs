//! Token authority: personal access tokens, Google-login session tokens, and
//! the validation contract answered for an external authorization layer.
//!
//! The binary in `main.rs` wires these modules behind a CLI; integration tests
//! in `tests/` drive them through this library crate.

pub mod api;
pub mod authority;
pub mod bootstrap;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod identity;
pub mod models;
pub mod state;
pub mod store;
