//! Poll loop around a running controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::boundary::Platform;
use crate::controller::SimulationController;
use crate::error::ControlError;

/// Why [`run_until_finished`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The simulation reached its termination condition.
    Finished,
    /// The interrupt flag was raised.
    Interrupted,
}

/// Drains one command per iteration and checks for termination until the
/// simulation finishes or `interrupt` is set.
///
/// A failed command is logged and the loop keeps going. Does not call `stop()`.
pub fn run_until_finished<P: Platform>(
    controller: &mut SimulationController<P>,
    poll_interval: Duration,
    interrupt: &AtomicBool,
) -> Result<RunOutcome, ControlError> {
    loop {
        match controller.process_commands() {
            Ok(_) => {}
            Err(e @ ControlError::FleetGrowth { .. }) => tracing::error!("{}", e),
            Err(e) => return Err(e),
        }
        if controller.is_finished()? {
            return Ok(RunOutcome::Finished);
        }
        if interrupt.load(Ordering::SeqCst) {
            tracing::info!("Interrupted");
            return Ok(RunOutcome::Interrupted);
        }
        thread::sleep(poll_interval);
    }
}
