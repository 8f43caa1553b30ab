//! Telegram notifier tests against a mock Bot API.

use emacross::adapters::telegram_notifier::TelegramNotifier;
use emacross::domain::error::ScannerError;
use emacross::ports::notifier_port::NotifierPort;
use mockito::{Matcher, Server};
use serde_json::json;

#[tokio::test]
async fn posts_chat_id_and_text() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/bot123:abc/sendMessage")
        .match_body(Matcher::Json(json!({
            "chat_id": "-1001",
            "text": "📊 EMA200 Cross Signals (1H)"
        })))
        .with_status(200)
        .with_body(r#"{"ok": true}"#)
        .create_async()
        .await;

    let notifier =
        TelegramNotifier::with_api_base(&server.url(), "123:abc".into(), "-1001".into()).unwrap();
    notifier.send("📊 EMA200 Cross Signals (1H)").await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn rejected_message_is_notify_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/bot123:abc/sendMessage")
        .with_status(400)
        .with_body(r#"{"ok": false, "description": "Bad Request: message is too long"}"#)
        .create_async()
        .await;

    let notifier =
        TelegramNotifier::with_api_base(&server.url(), "123:abc".into(), "-1001".into()).unwrap();
    let err = notifier.send("x").await.unwrap_err();

    match err {
        ScannerError::Notify { reason } => {
            assert!(reason.starts_with("HTTP 400"));
            assert!(reason.contains("message is too long"));
        }
        other => panic!("expected Notify, got {other:?}"),
    }
}

#[tokio::test]
async fn transport_error_does_not_leak_token() {
    // Nothing listens on port 9 locally.
    let notifier =
        TelegramNotifier::with_api_base("http://127.0.0.1:9", "999:secret".into(), "1".into())
            .unwrap();
    let err = notifier.send("x").await.unwrap_err();

    assert!(matches!(err, ScannerError::Notify { .. }));
    assert!(!err.to_string().contains("secret"));
}
