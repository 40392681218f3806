//! Interactive search → select → download session.
//!
//! [`state`] holds the synchronous state machine, [`driver`] runs it against
//! a [`Backend`] on the tokio runtime.

pub mod driver;
pub mod state;

pub use driver::{run, Backend, Render};
pub use state::{line_events, Command, Event, Phase, Session};
