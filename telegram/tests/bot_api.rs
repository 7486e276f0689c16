//! Bot API calls against a mock server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use eventbooker_core::notify::{Notifier, NotifyError};
use eventbooker_core::types::ChatId;
use eventbooker_runtime::shutdown;
use eventbooker_telegram::{TelegramClient, TelegramError, TelegramNotifier, UpdateListener};
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "123456:TEST";

fn client(server: &MockServer) -> TelegramClient {
    TelegramClient::new(TOKEN).with_api_url(server.uri())
}

fn ok_message() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "ok": true,
        "result": { "message_id": 1, "date": 0, "chat": { "id": 42, "type": "private" } }
    }))
}

#[tokio::test]
async fn notifier_prefixes_the_header_line() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_json(json!({
            "chat_id": 42,
            "text": "New notification!\nReservation 7 has been cancelled."
        })))
        .respond_with(ok_message())
        .expect(1)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(client(&server));
    notifier
        .send_text(ChatId::new(42), "Reservation 7 has been cancelled.")
        .await
        .unwrap();
}

#[tokio::test]
async fn sends_from_cloned_clients_do_not_overlap() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .respond_with(ok_message().set_delay(Duration::from_millis(150)))
        .expect(3)
        .mount(&server)
        .await;

    let shared = client(&server);
    let started = Instant::now();
    let sends: Vec<_> = (0..3)
        .map(|n| {
            let client = shared.clone();
            tokio::spawn(async move { client.send_message(n, "hello").await })
        })
        .collect();
    for send in sends {
        send.await.unwrap().unwrap();
    }

    assert!(started.elapsed() >= Duration::from_millis(450));
}

#[tokio::test]
async fn refused_message_maps_to_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        })))
        .mount(&server)
        .await;

    let err = TelegramNotifier::new(client(&server))
        .send_text(ChatId::new(1), "hello")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        NotifyError::Rejected {
            status: 400,
            reason: "Bad Request: chat not found".to_string()
        }
    );
}

#[tokio::test]
async fn flood_control_reports_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 5",
            "parameters": { "retry_after": 5 }
        })))
        .mount(&server)
        .await;

    let err = client(&server).send_message(1, "hello").await.unwrap_err();
    assert!(matches!(err, TelegramError::RateLimited { retry_after: Some(5) }));
}

#[tokio::test]
async fn invalid_token_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "ok": false,
            "error_code": 401,
            "description": "Unauthorized"
        })))
        .mount(&server)
        .await;

    let err = client(&server).send_message(1, "hello").await.unwrap_err();
    assert!(matches!(err, TelegramError::Unauthorized));
}

#[tokio::test]
async fn unreachable_api_is_unavailable() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let err = TelegramNotifier::new(TelegramClient::new(TOKEN).with_api_url(uri))
        .send_text(ChatId::new(1), "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::Unavailable(_)));
}

#[tokio::test]
async fn start_command_is_answered_with_chat_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/getUpdates")))
        .and(body_partial_json(json!({ "offset": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [{
                "update_id": 10,
                "message": {
                    "message_id": 1,
                    "date": 0,
                    "chat": { "id": 555, "type": "private", "username": "alice" },
                    "text": "/start"
                }
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/getUpdates")))
        .and(body_partial_json(json!({ "offset": 11 })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true, "result": [] }))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_json(json!({ "chat_id": 555, "text": "Your ChatId: 555" })))
        .respond_with(ok_message())
        .expect(1)
        .mount(&server)
        .await;

    let (trigger, signal) = shutdown::channel();
    let listener = UpdateListener::new(client(&server))
        .with_poll_timeout(Duration::from_secs(0))
        .spawn(signal);

    tokio::time::sleep(Duration::from_millis(200)).await;
    trigger.trigger();
    tokio::time::timeout(Duration::from_secs(2), listener)
        .await
        .expect("listener should stop on shutdown")
        .unwrap();
}
