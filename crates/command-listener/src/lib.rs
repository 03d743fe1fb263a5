//! HTTP endpoint that turns fleet growth requests into queued commands.
//!
//! - [`app`]: router and request handler
//! - [`server`]: listener thread lifecycle
//! - [`error`]: request rejections and thread errors

pub mod app;
pub mod error;
pub mod server;

pub use app::{create_app, ListenerState};
pub use error::{ApiError, ListenerError};
pub use server::{spawn, CommandListener};
