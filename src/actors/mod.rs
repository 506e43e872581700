//! Long-running tasks of the bot
//!
//! Each actor runs as an independent tokio task and is controlled through a
//! cloneable handle wrapping an mpsc command channel.
//!
//! ```text
//!   SchedulerActor (owns AlertEvaluator)          UpdatesActor
//!        │ every interval                              │ long-poll getUpdates
//!        ▼                                             ▼
//!   MetricsSource::snapshot ──▶ evaluate        CommandHandler
//!        │ non-empty batch                             │ reads Config only
//!        ▼                                             ▼
//!   AlertHandler (render + fan-out)               sendMessage reply
//! ```
//!
//! The two actors share nothing mutable: the scheduler is the only owner of
//! the cooldown state, the command side only ever reads the immutable config.

pub mod messages;
pub mod scheduler;
pub mod updates;
