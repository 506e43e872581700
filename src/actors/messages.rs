//! Message types for actor communication
//!
//! Each actor owns a command receiver; callers talk to it through a handle that
//! wraps the sender. Replies travel back over oneshot channels.

use tokio::sync::oneshot;

/// Commands that can be sent to the SchedulerActor
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run one tick right away, independent of the interval timer
    ///
    /// The reply arrives once the tick (including alert delivery) has finished.
    TickNow {
        respond_to: oneshot::Sender<TickOutcome>,
    },

    /// Stop the periodic timer and exit
    ///
    /// A tick in progress is finished first.
    Shutdown,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No snapshot could be collected; the evaluator was not consulted
    Skipped,

    /// Snapshot evaluated, nothing to report
    Quiet,

    /// A batch with this many alerts was handed to the alert handler
    Alerted(usize),
}

/// Commands that can be sent to the UpdatesActor
#[derive(Debug)]
pub enum BotCommand {
    /// Stop polling for updates and exit
    Shutdown,
}
