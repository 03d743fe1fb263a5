//! Command queue between producers (the listener) and the controller.
//!
//! The queue is unbounded and FIFO. Any number of [`CommandSender`] clones may
//! push concurrently; a single [`CommandChannel`] owner pops without blocking.

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use thiserror::Error;

use crate::command::Command;

/// Returned by [`CommandSender::put`] once the consuming channel is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("command channel closed, dropped {0}")]
pub struct SendError(pub Command);

/// Consumer side of the command queue.
#[derive(Debug)]
pub struct CommandChannel {
    tx: Sender<Command>,
    rx: Receiver<Command>,
}

/// Producer side of the command queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: Sender<Command>,
}

impl CommandChannel {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Creates a producer handle for this channel.
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            tx: self.tx.clone(),
        }
    }

    /// Enqueues a command from the consumer side.
    pub fn put(&self, command: Command) {
        // Cannot fail: the channel owns a live receiver.
        let _ = self.tx.send(command);
    }

    /// Pops the oldest pending command, or `None` when the queue is empty.
    pub fn try_get(&self) -> Option<Command> {
        match self.rx.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Number of commands waiting to be consumed.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandSender {
    /// Enqueues a command. Never blocks.
    pub fn put(&self, command: Command) -> Result<(), SendError> {
        self.tx.send(command).map_err(|e| SendError(e.0))
    }
}
