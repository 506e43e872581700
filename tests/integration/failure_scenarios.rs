//! Failure tests for the alerting pipeline
//!
//! These tests verify that the system handles failures gracefully:
//! - Metric collection errors and hangs
//! - Slow alert handlers
//! - Telegram refusing or never answering

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pi_monitor::actors::messages::TickOutcome;
use pi_monitor::actors::scheduler::{AlertHandler, SchedulerHandle};
use pi_monitor::alerts::{AlertDispatcher, NotificationFanout, NotifyError};
use pi_monitor::monitors::evaluator::{AlertBatch, AlertEvaluator, DEFAULT_COOLDOWN};
use pi_monitor::monitors::thresholds::ThresholdPolicy;
use pi_monitor::telegram::TelegramClient;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

fn evaluator() -> AlertEvaluator {
    AlertEvaluator::new(ThresholdPolicy::default(), DEFAULT_COOLDOWN)
}

#[tokio::test(start_paused = true)]
async fn test_collection_failure_leaves_state_untouched() {
    let source = Arc::new(FakeSource::new(with_temperature(75.0)));
    source.fail("thermal zone missing");
    let handler = Arc::new(RecordingHandler::default());
    let scheduler = SchedulerHandle::spawn(
        evaluator(),
        source.clone(),
        handler.clone(),
        settings(3600),
    );

    assert_eq!(scheduler.tick_now().await.unwrap(), TickOutcome::Skipped);

    // the failed tick must not have started a cooldown
    source.set(with_temperature(75.0));
    assert_eq!(scheduler.tick_now().await.unwrap(), TickOutcome::Alerted(1));
    assert_eq!(handler.batches().len(), 1);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_hanging_source_times_out() {
    let source = Arc::new(FakeSource::slow(
        with_temperature(75.0),
        Duration::from_secs(60),
    ));
    let handler = Arc::new(RecordingHandler::default());
    let scheduler = SchedulerHandle::spawn(
        evaluator(),
        source.clone(),
        handler.clone(),
        settings(3600),
    );

    assert_eq!(scheduler.tick_now().await.unwrap(), TickOutcome::Skipped);
    assert!(handler.batches().is_empty());

    scheduler.shutdown().await;
}

struct SlowHandler {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    handled: AtomicUsize,
}

#[async_trait]
impl AlertHandler for SlowHandler {
    async fn handle(&self, _batch: AlertBatch) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(45)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.handled.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_handler_never_overlaps_ticks() {
    let source = Arc::new(FakeSource::new(with_temperature(75.0)));
    let handler = Arc::new(SlowHandler {
        in_flight: AtomicUsize::new(0),
        max_in_flight: AtomicUsize::new(0),
        handled: AtomicUsize::new(0),
    });
    let scheduler = SchedulerHandle::spawn(
        // no cooldown, so every tick alerts
        AlertEvaluator::new(ThresholdPolicy::default(), Duration::ZERO),
        source.clone(),
        handler.clone(),
        settings(30),
    );

    tokio::time::sleep(Duration::from_secs(300)).await;
    scheduler.shutdown().await;

    assert_eq!(handler.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(handler.handled.load(Ordering::SeqCst) >= 2);
    // one tick takes 45s, so at most one every 45s fits
    assert!(source.calls() <= 300 / 45 + 1);
}

#[tokio::test]
async fn test_rejected_delivery_still_counts_as_alerted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_partial_json(json!({"chat_id": 2})))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "ok": false,
            "error_code": 403,
            "description": "Forbidden: bot was blocked by the user"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"message_id": 1, "date": 0, "chat": {"id": 1, "type": "private"}}
        })))
        .mount(&server)
        .await;

    let client = Arc::new(TelegramClient::new(&server.uri(), "123:abc").unwrap());
    let dispatcher = AlertDispatcher::new(
        NotificationFanout::new(client, Duration::from_secs(5)),
        vec![1, 2, 3],
    );
    let scheduler = SchedulerHandle::spawn(
        evaluator(),
        Arc::new(FakeSource::new(with_disk_usage(99.0))),
        Arc::new(dispatcher),
        settings(3600),
    );

    assert_eq!(scheduler.tick_now().await.unwrap(), TickOutcome::Alerted(1));
    // a failed delivery does not undo the cooldown
    assert_eq!(scheduler.tick_now().await.unwrap(), TickOutcome::Quiet);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_api_reports_transport_errors() {
    let client = Arc::new(TelegramClient::new("http://127.0.0.1:1", "123:abc").unwrap());
    let dispatcher = AlertDispatcher::new(
        NotificationFanout::new(client, Duration::from_secs(5)),
        vec![1, 2],
    );
    let batch = {
        let mut evaluator = evaluator();
        let alerts = evaluator.evaluate(&with_disk_usage(99.0), chrono::Utc::now());
        AlertBatch::new(alerts).unwrap()
    };

    let outcomes = dispatcher.dispatch(&batch).await;

    assert_eq!(outcomes.len(), 2);
    for outcome in outcomes {
        assert!(
            matches!(outcome.result, Err(NotifyError::Transport(_))),
            "unexpected outcome: {outcome:?}"
        );
    }
}
