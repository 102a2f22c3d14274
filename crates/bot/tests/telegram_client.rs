//! `TelegramClient` against a mocked Bot API

use bot::{BotClient, TelegramClient};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use teloxide::Bot;
use url::Url;

const TOKEN: &str = "123456:TEST";

fn client_for(server: &ServerGuard) -> TelegramClient {
    TelegramClient::with_bot(Bot::new(TOKEN).set_api_url(Url::parse(&server.url()).unwrap()))
}

/// teloxide addresses Bot API methods in PascalCase
fn method_path(method: &str) -> String {
    format!("/bot{TOKEN}/{method}")
}

fn message_update(update_id: u32) -> serde_json::Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": 1700000000,
            "chat": {"id": 42, "type": "private", "first_name": "Test"},
            "from": {"id": 7, "is_bot": false, "first_name": "Test", "username": "tester"},
            "text": "hello"
        }
    })
}

fn ok_body(result: serde_json::Value) -> String {
    json!({ "ok": true, "result": result }).to_string()
}

#[tokio::test]
async fn test_subscribe_removes_webhook_and_advances_offset() {
    let mut server = Server::new_async().await;

    let delete_webhook = server
        .mock("POST", method_path("DeleteWebhook").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(ok_body(json!(true)))
        .expect(1)
        .create_async()
        .await;
    let first_poll = server
        .mock("POST", method_path("GetUpdates").as_str())
        .match_body(Matcher::PartialJson(json!({ "offset": 0, "timeout": 1 })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(ok_body(json!([message_update(7), message_update(8)])))
        .create_async()
        .await;
    let next_poll = server
        .mock("POST", method_path("GetUpdates").as_str())
        .match_body(Matcher::PartialJson(json!({ "offset": 9 })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(ok_body(json!([])))
        .create_async()
        .await;

    let client = client_for(&server);
    let mut updates = client.subscribe_updates(1).await;

    // Removed before the first getUpdates is issued
    delete_webhook.assert_async().await;

    let (first, second) = tokio::time::timeout(Duration::from_secs(5), async {
        (updates.recv().await, updates.recv().await)
    })
    .await
    .expect("both updates should arrive");
    let first = first.expect("first update");
    let second = second.expect("second update");
    assert_eq!(first.update_id, 7);
    assert_eq!(second.update_id, 8);
    let message = second.into_message().expect("message payload");
    assert_eq!(message.chat.id, 42);
    assert_eq!(message.from.and_then(|s| s.username).as_deref(), Some("tester"));

    tokio::time::timeout(Duration::from_secs(5), async {
        while !next_poll.matched_async().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("the next poll should acknowledge update 8");
    assert!(first_poll.matched_async().await);
}

#[tokio::test]
async fn test_failed_poll_is_retried_after_delay() {
    let mut server = Server::new_async().await;

    let _delete_webhook = server
        .mock("POST", method_path("DeleteWebhook").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(ok_body(json!(true)))
        .create_async()
        .await;

    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&attempts);
    let _get_updates = server
        .mock("POST", method_path("GetUpdates").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body_from_request(move |_| {
            let body = match seen.fetch_add(1, Ordering::SeqCst) {
                0 => json!({ "ok": false, "error_code": 502, "description": "Bad Gateway" })
                    .to_string(),
                1 => ok_body(json!([message_update(1)])),
                _ => ok_body(json!([])),
            };
            body.into_bytes()
        })
        .create_async()
        .await;

    let client = client_for(&server);
    let started = Instant::now();
    let mut updates = client.subscribe_updates(1).await;

    let update = tokio::time::timeout(Duration::from_secs(10), updates.recv())
        .await
        .expect("update after retry")
        .expect("subscription open");

    assert_eq!(update.update_id, 1);
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(attempts.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_register_webhook_sends_target_url() {
    let mut server = Server::new_async().await;

    let set_webhook = server
        .mock("POST", method_path("SetWebhook").as_str())
        // Sent as multipart because of the optional certificate field
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="url""#.to_string()),
            Matcher::Regex(r"https://example\.com/hook/telegram".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(ok_body(json!(true)))
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    client
        .register_webhook(Url::parse("https://example.com/hook/telegram").unwrap())
        .await
        .unwrap();

    set_webhook.assert_async().await;
}

#[tokio::test]
async fn test_register_webhook_surfaces_platform_rejection() {
    let mut server = Server::new_async().await;

    let set_webhook = server
        .mock("POST", method_path("SetWebhook").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: bad webhook: HTTPS url must be provided for webhook"
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .register_webhook(Url::parse("https://example.com/hook/telegram").unwrap())
        .await
        .unwrap_err();

    set_webhook.assert_async().await;
    let message = format!("{err:#}");
    assert!(message.contains("setWebhook request failed"));
    assert!(message.contains("HTTPS url must be provided"));
}
