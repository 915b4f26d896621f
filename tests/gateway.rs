//! Tutor API gateway integration tests
//!
//! Time is paused so backoff and timeout durations are exact.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

use hanzi_deck::gateway::{Action, Backoff, RetryPolicy};
use hanzi_deck::Error;

mod common;
use common::{MockTransport, Reply, error_reply, gateway, text_reply};

#[tokio::test(start_paused = true)]
async fn test_two_server_errors_then_success() {
    let transport = Arc::new(MockTransport::new([
        error_reply(500, "overloaded"),
        error_reply(500, "overloaded"),
        text_reply("你好"),
    ]));
    let gateway = gateway(&transport);

    let start = Instant::now();
    let response = gateway
        .call(Action::Translate, json!({ "text": "hello" }))
        .await
        .unwrap();

    assert_eq!(transport.calls(), 3);
    assert_eq!(start.elapsed(), Duration::from_millis(3000));
    assert_eq!(
        hanzi_deck::gateway::response_text(&response).as_deref(),
        Some("你好")
    );
}

#[tokio::test(start_paused = true)]
async fn test_timeout_exhausts_retries() {
    let transport = Arc::new(MockTransport::new([]).with_fallback(Reply::Pending));
    let gateway = gateway(&transport);

    let start = Instant::now();
    let err = gateway
        .call(Action::Chat, json!({ "message": "在吗" }))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout));
    assert_eq!(transport.calls(), 3);
    // three 25s attempts and two 1.5s pauses
    assert_eq!(start.elapsed(), Duration::from_millis(78_000));
}

#[tokio::test(start_paused = true)]
async fn test_client_error_is_not_retried() {
    let transport = Arc::new(MockTransport::new([error_reply(400, "bad action")]));
    let gateway = gateway(&transport);

    let err = gateway
        .call(Action::CorrectWriting, json!({ "text": "" }))
        .await
        .unwrap_err();

    match err {
        Error::Server { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "bad action");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_network_error_is_retried() {
    let transport = Arc::new(MockTransport::new([Reply::NetworkError, text_reply("ok")]));
    let gateway = gateway(&transport);

    tokio_test::assert_ok!(gateway.call(Action::Translate, json!({})).await);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_tts_gets_single_retry() {
    let transport = Arc::new(MockTransport::new([]).with_fallback(error_reply(503, "busy")));
    let gateway = gateway(&transport);

    let err = gateway
        .call(Action::TextToSpeech, json!({ "text": "你好" }))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Server { status: 503, .. }));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_custom_policy_is_honoured() {
    let transport = Arc::new(MockTransport::new([]).with_fallback(Reply::Pending));
    let gateway = gateway(&transport).with_policy(RetryPolicy {
        max_retries: 1,
        timeout: Duration::from_secs(5),
        backoff: Backoff::Fixed(Duration::from_secs(2)),
    });

    let start = Instant::now();
    let err = gateway.call(Action::Translate, json!({})).await.unwrap_err();

    assert!(matches!(err, Error::Timeout));
    assert_eq!(transport.calls(), 2);
    assert_eq!(start.elapsed(), Duration::from_secs(12));
}

#[tokio::test(start_paused = true)]
async fn test_request_body_carries_action() {
    let transport = Arc::new(MockTransport::new([text_reply("x")]));
    let gateway = gateway(&transport);

    tokio_test::assert_ok!(
        gateway
            .call(Action::GetCharacterInfo, json!({ "character": "好" }))
            .await
    );

    assert_eq!(
        transport.last_body(),
        json!({ "action": "get-character-info", "character": "好" })
    );
}
