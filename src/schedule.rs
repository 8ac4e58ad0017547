//! Deferred re-invocation of the scan loop.

use std::time::Duration;

use crate::error::ScheduleError;

/// Session generation a piece of deferred work was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticket(pub u64);

impl Ticket {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// When the next scan step should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    /// Next display refresh (`requestAnimationFrame` in the browser).
    NextFrame,
    /// Fixed delay, used for the post-detection cooldown.
    After(Duration),
}

/// Arms exactly one future call to `ScanSession::scan_frame(ticket)`.
///
/// An error means nothing was armed and the loop would end here.
pub trait Scheduler {
    fn schedule(&mut self, delay: Delay, ticket: Ticket) -> Result<(), ScheduleError>;
}
