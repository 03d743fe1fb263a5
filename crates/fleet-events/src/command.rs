//! Fleet growth commands.
//!
//! A [`Command`] asks the control plane to add taxis and passengers to a live
//! simulation. Commands are produced at the network boundary and consumed
//! exactly once by the controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Request to grow the fleet by a number of taxis and passengers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Command {
    pub taxis: u32,
    pub passengers: u32,
}

/// Reasons a runtime request could not be turned into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandDecodeError {
    #[error("{field} count must not be negative (got {value})")]
    Negative { field: &'static str, value: String },
    #[error("{field} count is not an integer: {value:?}")]
    NotAnInteger { field: &'static str, value: String },
    #[error("{field} count is too large (got {value})")]
    OutOfRange { field: &'static str, value: String },
}

impl Command {
    pub fn new(taxis: u32, passengers: u32) -> Self {
        Self { taxis, passengers }
    }

    /// Decodes the two raw path segments of a growth request.
    pub fn from_path_params(taxis: &str, passengers: &str) -> Result<Self, CommandDecodeError> {
        Ok(Self {
            taxis: decode_count("taxis", taxis)?,
            passengers: decode_count("passengers", passengers)?,
        })
    }

    /// Returns true when the command would not create any agent.
    pub fn is_empty(&self) -> bool {
        self.taxis == 0 && self.passengers == 0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "add {} taxis, {} passengers", self.taxis, self.passengers)
    }
}

fn decode_count(field: &'static str, raw: &str) -> Result<u32, CommandDecodeError> {
    let trimmed = raw.trim();
    match trimmed.parse::<i128>() {
        Ok(n) if n < 0 => Err(CommandDecodeError::Negative {
            field,
            value: trimmed.to_string(),
        }),
        Ok(n) => u32::try_from(n).map_err(|_| CommandDecodeError::OutOfRange {
            field,
            value: trimmed.to_string(),
        }),
        Err(_) => Err(CommandDecodeError::NotAnInteger {
            field,
            value: raw.to_string(),
        }),
    }
}
