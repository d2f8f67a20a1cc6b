//! Deterministic simulation harness for Parley.
//!
//! Runs the sync engine against an in-process backend on a virtual clock, so
//! reconnect backoff, typing expiry and echo races replay identically on
//! every run.
//!
//! # Components
//!
//! - [`SimEnv`]: Virtual clock implementing [`parley_core::Environment`]
//! - [`SimServer`]: In-memory REST backend and frame fan-out
//! - [`SimDriver`]: [`parley_app::Driver`] wired to a shared [`SimServer`]
//! - [`invariants`]: Properties checked against session snapshots

#![warn(missing_docs)]

pub mod invariants;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_server;

pub use sim_driver::{Shown, SimDriver};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_server::{SharedServer, SimServer};
