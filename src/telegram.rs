//! Minimal client for the Telegram Bot API
//!
//! Only the three methods the bot needs are implemented: `getMe`, `getUpdates`
//! and `sendMessage`. Every call is a JSON `POST` to `{api}/bot{token}/{method}`
//! and answers with the usual `{ok, result, description}` envelope.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{instrument, trace};

use crate::alerts::{Notifier, NotifyError};

/// Must stay above the long-poll timeout handed to `getUpdates`.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

const PARSE_MODE: &str = "Markdown";

/// Result type alias for Bot API calls
pub type TelegramResult<T> = Result<T, TelegramError>;

#[derive(Debug)]
pub enum TelegramError {
    /// The request could not be sent or the answer could not be read
    Http(reqwest::Error),

    /// The API answered with `ok: false` or a non-success status
    Api(String),
}

impl fmt::Display for TelegramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelegramError::Http(err) => write!(f, "telegram request failed: {}", err),
            TelegramError::Api(msg) => write!(f, "telegram API error: {}", msg),
        }
    }
}

impl std::error::Error for TelegramError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelegramError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        // the request URL carries the bot token
        TelegramError::Http(err.without_url())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    base: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str) -> TelegramResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    /// The bot's own account, doubles as a token check at startup.
    #[instrument(skip(self))]
    pub async fn get_me(&self) -> TelegramResult<User> {
        self.call("getMe", &json!({})).await
    }

    /// Long-poll for new messages, waiting up to `timeout_secs` on the server side.
    #[instrument(skip(self))]
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> TelegramResult<Vec<Update>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    #[instrument(skip(self, text))]
    pub async fn send_message(&self, chat_id: i64, text: &str) -> TelegramResult<Message> {
        self.call(
            "sendMessage",
            &json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": PARSE_MODE,
            }),
        )
        .await
    }

    async fn call<P, T>(&self, method: &str, params: &P) -> TelegramResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        trace!("calling {method}");

        let response = self
            .client
            .post(format!("{}/{}", self.base, method))
            .json(params)
            .send()
            .await?;

        let status = response.status();
        let body = match response.json::<ApiResponse<T>>().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(TelegramError::Api(format!("HTTP {}", status)));
            }
            Err(err) => return Err(err.into()),
        };

        if !body.ok {
            return Err(TelegramError::Api(
                body.description
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            ));
        }

        body.result
            .ok_or_else(|| TelegramError::Api(format!("{method} returned no result")))
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send(&self, recipient: i64, message: &str) -> Result<(), NotifyError> {
        match self.send_message(recipient, message).await {
            Ok(_) => Ok(()),
            Err(TelegramError::Http(err)) => Err(NotifyError::Transport(err.to_string())),
            Err(TelegramError::Api(msg)) => Err(NotifyError::Rejected(msg)),
        }
    }
}
