//! Shared data types for the taxi fleet simulation.
//!
//! This crate contains plain data and the command queue shared between the
//! control plane, the command listener and the agent platform. It holds no
//! simulation logic.

pub mod channel;
pub mod command;
pub mod geo;
pub mod records;

pub use channel::{CommandChannel, CommandSender, SendError};
pub use command::{Command, CommandDecodeError};
pub use geo::Position;
pub use records::{
    AgentKind, AggregateStats, PassengerRecord, PassengerStatus, TaxiRecord, TaxiStatus,
};
