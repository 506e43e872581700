use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use futures::future::join_all;
use tracing::{error, info, instrument, warn};

use crate::actors::scheduler::AlertHandler;
use crate::monitors::evaluator::AlertBatch;
use crate::render::render_alerts;

#[derive(Debug, Clone, PartialEq)]
pub enum NotifyError {
    /// The request never got an answer (connection refused, DNS, TLS, ...)
    Transport(String),

    /// The transport answered but refused the message
    Rejected(String),

    /// No answer within the delivery timeout
    Timeout,
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::Transport(msg) => write!(f, "transport error: {}", msg),
            NotifyError::Rejected(msg) => write!(f, "message rejected: {}", msg),
            NotifyError::Timeout => write!(f, "delivery timed out"),
        }
    }
}

impl std::error::Error for NotifyError {}

/// Delivers a text message to a single recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: i64, message: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOutcome {
    pub recipient: i64,
    pub result: Result<(), NotifyError>,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        self.result.is_ok()
    }
}

/// Sends one message to many recipients, each attempt isolated from the others.
#[derive(Clone)]
pub struct NotificationFanout {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl NotificationFanout {
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    /// Attempt delivery to every recipient concurrently.
    ///
    /// Each attempt has its own timeout; outcomes are returned in recipient order.
    /// Nothing is retried.
    #[instrument(skip(self, message))]
    pub async fn deliver(&self, message: &str, recipients: &[i64]) -> Vec<DeliveryOutcome> {
        let attempts = recipients.iter().map(|&recipient| async move {
            let result =
                match tokio::time::timeout(self.timeout, self.notifier.send(recipient, message))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(NotifyError::Timeout),
                };

            DeliveryOutcome { recipient, result }
        });

        join_all(attempts).await
    }
}

/// Turns alert batches from the scheduler into messages for every recipient.
#[derive(Clone)]
pub struct AlertDispatcher {
    fanout: NotificationFanout,
    recipients: Arc<[i64]>,
}

impl AlertDispatcher {
    pub fn new(fanout: NotificationFanout, recipients: impl Into<Arc<[i64]>>) -> Self {
        Self {
            fanout,
            recipients: recipients.into(),
        }
    }

    /// Render `batch` and fan it out, logging the outcome per recipient.
    ///
    /// The timestamp line shows when the tick emitted the batch.
    pub async fn dispatch(&self, batch: &AlertBatch) -> Vec<DeliveryOutcome> {
        let message = render_alerts(batch, &batch.timestamp().with_timezone(&Local));
        let outcomes = self.fanout.deliver(&message, &self.recipients).await;

        for outcome in &outcomes {
            match &outcome.result {
                Ok(()) => info!("alert sent to user {}", outcome.recipient),
                Err(e) => error!("error sending alert to {}: {}", outcome.recipient, e),
            }
        }

        let failed = outcomes.iter().filter(|o| !o.is_delivered()).count();
        if failed > 0 {
            warn!("{failed}/{} alert deliveries failed", outcomes.len());
        }

        outcomes
    }
}

#[async_trait]
impl AlertHandler for AlertDispatcher {
    async fn handle(&self, batch: AlertBatch) {
        self.dispatch(&batch).await;
    }
}
