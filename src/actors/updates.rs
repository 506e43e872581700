//! UpdatesActor - Long-polls Telegram for chat commands and answers them
//!
//! ## Message Flow
//!
//! ```text
//! getUpdates (long poll) → CommandHandler::handle_update → sendMessage
//!     ↑
//!     └─── Commands (Shutdown)
//! ```
//!
//! Transport errors never stop the loop; the actor backs off and polls again.
//! An in-flight long poll is simply dropped on shutdown.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, instrument, trace, warn};

use crate::commands::CommandHandler;
use crate::telegram::{TelegramClient, Update};

use super::messages::BotCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatesSettings {
    /// Server side wait of a single `getUpdates` call
    pub poll_timeout_secs: u64,

    /// Pause after a failed poll
    pub error_backoff: Duration,
}

impl Default for UpdatesSettings {
    fn default() -> Self {
        Self {
            poll_timeout_secs: 60,
            error_backoff: Duration::from_secs(5),
        }
    }
}

pub struct UpdatesActor {
    client: TelegramClient,

    handler: CommandHandler,

    command_rx: mpsc::Receiver<BotCommand>,

    settings: UpdatesSettings,

    /// Id of the next update to fetch; everything below is acknowledged
    offset: i64,
}

impl UpdatesActor {
    pub fn new(
        client: TelegramClient,
        handler: CommandHandler,
        command_rx: mpsc::Receiver<BotCommand>,
        settings: UpdatesSettings,
    ) -> Self {
        Self {
            client,
            handler,
            command_rx,
            settings,
            offset: 0,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("listening for commands");

        loop {
            tokio::select! {
                result = self.client.get_updates(self.offset, self.settings.poll_timeout_secs) => {
                    match result {
                        Ok(updates) => self.process(updates).await,
                        Err(e) => {
                            error!("failed to get updates: {e}");
                            if self.back_off().await {
                                break;
                            }
                        }
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(BotCommand::Shutdown) => debug!("received shutdown command"),
                        None => warn!("command channel closed, shutting down"),
                    }
                    break;
                }
            }
        }

        debug!("updates actor stopped");
    }

    async fn process(&mut self, updates: Vec<Update>) {
        trace!("received {} update(s)", updates.len());

        for update in updates {
            self.offset = self.offset.max(update.update_id + 1);

            let Some(reply) = self.handler.handle_update(&update).await else {
                continue;
            };

            if let Err(e) = self.client.send_message(reply.chat_id, &reply.text).await {
                error!("error sending reply to {}: {e}", reply.chat_id);
            }
        }
    }

    /// Wait out the back-off; `true` when the actor was told to stop meanwhile.
    async fn back_off(&mut self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.settings.error_backoff) => false,
            cmd = self.command_rx.recv() => {
                debug!("stopping during back-off: {cmd:?}");
                true
            }
        }
    }
}

/// Handle for controlling the UpdatesActor
#[derive(Clone)]
pub struct UpdatesHandle {
    sender: mpsc::Sender<BotCommand>,
}

impl UpdatesHandle {
    pub fn spawn(client: TelegramClient, handler: CommandHandler, settings: UpdatesSettings) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = UpdatesActor::new(client, handler, cmd_rx, settings);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Stop polling and wait until the actor has exited.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(BotCommand::Shutdown).await;
        self.sender.closed().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.sender.is_closed()
    }
}
