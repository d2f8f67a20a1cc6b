//! Line-oriented terminal client for Parley
//!
//! A thin shell over [`parley_app::Driver`] that reads commands from stdin
//! and prints what changed. All orchestration lives in the generic
//! [`parley_app::Runtime`]; this crate only handles terminal I/O, the
//! WebSocket transport and REST calls.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod terminal;
pub mod view;

pub use error::CliError;
pub use parley_app::{App, AppEvent, Bridge, Command, Driver, Runtime};
pub use terminal::{TerminalDriver, TerminalError};
pub use view::View;
