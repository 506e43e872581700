//! Alert fan-out against a mocked Bot API

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use pi_monitor::alerts::{AlertDispatcher, NotificationFanout, NotifyError};
use pi_monitor::monitors::evaluator::{AlertBatch, AlertEvaluator, DEFAULT_COOLDOWN};
use pi_monitor::monitors::thresholds::ThresholdPolicy;
use pi_monitor::telegram::TelegramClient;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

fn ok_response(chat_id: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "ok": true,
        "result": {"message_id": 1, "date": 0, "chat": {"id": chat_id, "type": "private"}}
    }))
}

fn hot_batch() -> AlertBatch {
    let mut snapshot = with_temperature(82.5);
    snapshot.memory.used_percent = 91.0;

    let mut evaluator = AlertEvaluator::new(ThresholdPolicy::default(), DEFAULT_COOLDOWN);
    AlertBatch::new(evaluator.evaluate(&snapshot, Utc::now())).unwrap()
}

fn dispatcher(server: &MockServer, recipients: Vec<i64>, timeout: Duration) -> AlertDispatcher {
    let client = Arc::new(TelegramClient::new(&server.uri(), "123:abc").unwrap());
    AlertDispatcher::new(NotificationFanout::new(client, timeout), recipients)
}

#[tokio::test]
async fn test_every_recipient_gets_the_whole_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_partial_json(json!({"parse_mode": "Markdown"})))
        .respond_with(ok_response(1))
        .expect(3)
        .mount(&server)
        .await;

    let outcomes = dispatcher(&server, vec![111, 222, 333], Duration::from_secs(5))
        .dispatch(&hot_batch())
        .await;

    assert!(outcomes.iter().all(|o| o.is_delivered()));

    let mut chats = vec![];
    for request in server.received_requests().await.unwrap() {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let text = body["text"].as_str().unwrap();

        assert!(text.starts_with("🚨 *SYSTEM ALERT*\n\n🌡️ *CPU temperature too high!*"));
        assert!(text.contains("\n\n💾 *Memory almost full!*"));
        assert!(text.contains("⏰ _Time: "));
        chats.push(body["chat_id"].as_i64().unwrap());
    }
    chats.sort();
    assert_eq!(chats, vec![111, 222, 333]);
}

#[tokio::test]
async fn test_rejected_chat_does_not_block_the_others() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_partial_json(json!({"chat_id": 222})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ok_response(1))
        .mount(&server)
        .await;

    let outcomes = dispatcher(&server, vec![111, 222, 333], Duration::from_secs(5))
        .dispatch(&hot_batch())
        .await;

    let recipients: Vec<i64> = outcomes.iter().map(|o| o.recipient).collect();
    assert_eq!(recipients, vec![111, 222, 333]);
    assert!(outcomes[0].is_delivered());
    assert_eq!(
        outcomes[1].result,
        Err(NotifyError::Rejected("Bad Request: chat not found".to_string()))
    );
    assert!(outcomes[2].is_delivered());
}

#[tokio::test]
async fn test_slow_chat_times_out_alone() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_partial_json(json!({"chat_id": 333})))
        .respond_with(ok_response(333).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ok_response(1))
        .mount(&server)
        .await;

    let started = Instant::now();
    let outcomes = dispatcher(&server, vec![111, 222, 333], Duration::from_millis(500))
        .dispatch(&hot_batch())
        .await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(outcomes[0].is_delivered());
    assert!(outcomes[1].is_delivered());
    assert_eq!(outcomes[2].result, Err(NotifyError::Timeout));
}
