//! Chat command handling
//!
//! Turns an incoming [`Update`] into at most one [`Reply`]. Everything here only
//! reads the immutable [`Config`]; alerting state lives in the scheduler.

use std::sync::{Arc, LazyLock};

use chrono::Local;
use regex::Regex;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::monitors::source::{CollectionError, MetricsSource};
use crate::render::{render_alert_status, render_system_report, render_wake_outcome};
use crate::telegram::Update;
use crate::wol;

/// `/name`, optionally addressed as `/name@SomeBot`, followed by whitespace or the end.
static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([A-Za-z0-9_]+)(?:@\w+)?(?:\s|$)").expect("command pattern is valid")
});

const START_TEXT: &str = "👋 Hello! Use /pi to see the Raspberry Pi system status.";

const HELP_TEXT: &str = "📖 *Commands:*\n\n\
    /pi - System status (CPU, RAM, disk, network)\n\
    /wake - Turn on the PC via Wake-on-LAN\n\
    /id - Show your user ID\n\
    /alert - Show alert status\n\
    /help - Show this help";

const UNKNOWN_TEXT: &str = "❓ Unknown command. Use /help to see the list of commands.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Id,
    Pi,
    Alert,
    Wake,
    Unknown(String),
}

impl Command {
    /// `None` when `text` is not a command at all.
    pub fn parse(text: &str) -> Option<Command> {
        let captures = COMMAND_RE.captures(text)?;
        let name = captures.get(1)?.as_str().to_lowercase();

        Some(match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "id" => Command::Id,
            "pi" => Command::Pi,
            "alert" => Command::Alert,
            "wake" => Command::Wake,
            _ => Command::Unknown(name),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub chat_id: i64,
    pub text: String,
}

pub struct CommandHandler {
    config: Arc<Config>,
    source: Arc<dyn MetricsSource>,
}

impl CommandHandler {
    pub fn new(config: Arc<Config>, source: Arc<dyn MetricsSource>) -> Self {
        Self { config, source }
    }

    /// Ignores updates without a command message or without a sender.
    pub async fn handle_update(&self, update: &Update) -> Option<Reply> {
        let message = update.message.as_ref()?;
        let command = Command::parse(message.text.as_deref()?)?;
        let user = message.from.as_ref()?;
        let chat_id = message.chat.id;

        if !self.config.is_user_allowed(user.id) {
            warn!(
                "unauthorized access attempt from user {} (@{})",
                user.id,
                user.username.as_deref().unwrap_or("")
            );
            return Some(Reply {
                chat_id,
                text: format!(
                    "🚫 You are not allowed to use this bot.\n\n🆔 Your User ID: `{}`",
                    user.id
                ),
            });
        }

        debug!("user {} sent {:?}", user.id, command);

        let text = match command {
            Command::Start => START_TEXT.to_string(),
            Command::Help => HELP_TEXT.to_string(),
            Command::Id => format!("🆔 Your User ID: `{}`", user.id),
            Command::Pi => self.system_report().await,
            Command::Alert => render_alert_status(&self.config.alert_status()),
            Command::Wake => {
                let outcome = wol::wake(&self.config.wol).await;
                render_wake_outcome(&outcome, &self.config.wol.broadcast)
            }
            Command::Unknown(_) => UNKNOWN_TEXT.to_string(),
        };

        Some(Reply { chat_id, text })
    }

    async fn system_report(&self) -> String {
        let snapshot = tokio::time::timeout(
            self.config.alerts.snapshot_timeout,
            self.source.snapshot(),
        )
        .await
        .unwrap_or(Err(CollectionError::Timeout));

        match snapshot {
            Ok(snapshot) => render_system_report(&snapshot, &Local::now()),
            Err(e) => {
                error!("error collecting system info: {e}");
                format!("❌ Error collecting system info: {e}")
            }
        }
    }
}
