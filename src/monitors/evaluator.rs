//! Threshold evaluation with per-metric cooldown.
//!
//! ```text
//! reading unavailable            → skipped, state untouched
//! reading <= ceiling             → no alert
//! reading >  ceiling, never sent → alert, remember `now`
//! reading >  ceiling, sent at t  → alert only if now - t >= cooldown
//! ```
//!
//! The cooldown keeps a metric that hovers around its ceiling from producing
//! an alert on every tick.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, trace};

use crate::MetricSnapshot;
use crate::render::alert_message;

use super::thresholds::{MetricKind, ThresholdPolicy};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// A single threshold breach that passed the cooldown gate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub kind: MetricKind,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// The alerts of one tick, never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertBatch(Vec<Alert>);

impl AlertBatch {
    /// Returns `None` for an empty list, so there is no such thing as an empty batch.
    pub fn new(alerts: Vec<Alert>) -> Option<Self> {
        (!alerts.is_empty()).then_some(Self(alerts))
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.0
    }

    /// When the batch was emitted; all alerts of one tick share it.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0[0].timestamp
    }

    pub fn kinds(&self) -> Vec<MetricKind> {
        self.0.iter().map(|alert| alert.kind).collect()
    }

    pub fn into_inner(self) -> Vec<Alert> {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    policy: ThresholdPolicy,
    cooldown: TimeDelta,
    last_alerts: HashMap<MetricKind, DateTime<Utc>>,
}

impl AlertEvaluator {
    pub fn new(policy: ThresholdPolicy, cooldown: Duration) -> Self {
        Self {
            policy,
            cooldown: TimeDelta::from_std(cooldown).unwrap_or(TimeDelta::MAX),
            last_alerts: HashMap::new(),
        }
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    /// When an alert of `kind` was last emitted, if ever.
    pub fn last_alert(&self, kind: MetricKind) -> Option<DateTime<Utc>> {
        self.last_alerts.get(&kind).copied()
    }

    /// Compare `snapshot` against the policy and emit the alerts the cooldown admits.
    ///
    /// Alerts come back in [`MetricKind::ALL`] order. Every emitted alert has
    /// already been recorded as "last emitted" when this returns.
    pub fn evaluate(&mut self, snapshot: &MetricSnapshot, now: DateTime<Utc>) -> Vec<Alert> {
        let mut alerts = vec![];

        for kind in MetricKind::ALL {
            let Some(value) = kind.reading(snapshot) else {
                trace!("{kind}: no reading, skipping");
                continue;
            };

            let threshold = self.policy.ceiling(kind);
            if !self.policy.is_breached(kind, value) {
                trace!("{kind}: {value:.1} within {threshold:.1}");
                continue;
            }

            if !self.can_alert(kind, now) {
                debug!("{kind}: {value:.1} > {threshold:.1}, suppressed by cooldown");
                continue;
            }

            debug!("{kind}: {value:.1} > {threshold:.1}, emitting alert");
            self.last_alerts.insert(kind, now);
            alerts.push(Alert {
                kind,
                value,
                threshold,
                message: alert_message(kind, value, threshold, snapshot),
                timestamp: now,
            });
        }

        alerts
    }

    fn can_alert(&self, kind: MetricKind, now: DateTime<Utc>) -> bool {
        match self.last_alerts.get(&kind) {
            None => true,
            Some(last) => now.signed_duration_since(*last) >= self.cooldown,
        }
    }
}
