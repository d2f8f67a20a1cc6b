//! Application layer for Parley
//!
//! Pure state machines and a generic runtime for the chat UI, enabling
//! deterministic simulation testing with the same code that runs in
//! production.
//!
//! # Components
//!
//! - [`App`]: UI state machine (composer, chat navigation, commands)
//! - [`Composer`]: Draft text and the sender-side typing timer
//! - [`Bridge`]: Protocol bridge (translates App actions to Client events)
//! - [`Driver`]: Trait for platform-specific I/O abstraction
//! - [`Runtime`]: Generic orchestration loop using Driver

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod app;
mod bridge;
mod command;
mod composer;
mod driver;
mod effect;
mod event;
mod input;
mod runtime;

pub use action::AppAction;
pub use app::{App, Notification};
pub use bridge::Bridge;
pub use command::{Command, CommandError};
pub use composer::{Composer, TYPING_IDLE};
pub use driver::{Driver, DriverInput};
pub use effect::{Effect, RestCall, RestResult};
pub use event::AppEvent;
pub use input::KeyInput;
pub use runtime::Runtime;
