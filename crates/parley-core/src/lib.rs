//! Core building blocks for the Parley sync engine.
//!
//! Everything here is sans-IO: state machines take the current time as a
//! parameter and return actions for a driver to execute. The
//! [`env::Environment`] trait is the only place real time enters the system.

#![forbid(unsafe_code)]

pub mod backoff;
pub mod channel;
pub mod env;
pub mod error;
pub mod system_env;
pub mod timer;

pub use backoff::Backoff;
pub use channel::{Channel, ChannelAction, ChannelConfig, ChannelState};
pub use env::Environment;
pub use error::ChannelError;
pub use system_env::SystemEnv;
pub use timer::Timer;
