//! Ingestion endpoint end-to-end tests

use super::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use whisper_core::{Recipient, WhisperMessage};

#[tokio::test]
async fn test_broadcast_post_reaches_every_agent() {
    let bus = Arc::new(WhisperBus::new());
    let (_a, seen_a) = listening_agent("A", &bus);
    let (_b, seen_b) = listening_agent("B", &bus);
    let (addr, _handle, _queue) = start_test_server(bus.clone()).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/osc", addr))
        .json(&json!({ "from": "x", "to": "*", "message": "hi" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["delivered"], 2);

    // The response is only sent after dispatch, so no waiting is needed
    let expected = vec![("x".to_string(), "hi".to_string())];
    assert_eq!(*seen_a.lock().unwrap(), expected);
    assert_eq!(*seen_b.lock().unwrap(), expected);
}

#[tokio::test]
async fn test_direct_post_reaches_only_addressee() {
    let bus = Arc::new(WhisperBus::new());
    let (_a, seen_a) = listening_agent("A", &bus);
    let (_b, seen_b) = listening_agent("B", &bus);
    let (addr, _handle, _queue) = start_test_server(bus.clone()).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/osc", addr))
        .json(&json!({ "from": "A", "to": "B", "message": "bless" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(
        *seen_b.lock().unwrap(),
        vec![("A".to_string(), "bless".to_string())]
    );
    assert!(seen_a.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_field_is_rejected_without_publish() {
    let bus = Arc::new(WhisperBus::new());
    let (_a, seen) = listening_agent("A", &bus);
    let (addr, _handle, _queue) = start_test_server(bus.clone()).await;
    let client = reqwest::Client::new();

    for payload in [
        json!({ "from": "x", "message": "hi" }),
        json!({ "to": "*", "message": "hi" }),
        json!({ "from": "x", "to": "*" }),
        json!({ "from": "x", "to": "*", "message": "   " }),
    ] {
        let resp = client
            .post(format!("http://{}/osc", addr))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST, "{}", payload);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("missing"));
    }

    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(bus.stats().total_published, 0);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let bus = Arc::new(WhisperBus::new());
    let (addr, _handle, _queue) = start_test_server(bus.clone()).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/osc", addr))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(bus.stats().total_published, 0);
}

#[tokio::test]
async fn test_council_chain_over_http() {
    let bus = Arc::new(WhisperBus::new());
    let panel = Arc::new(whisper_core::TextPanel::new());
    let council = whisper_core::Council::assemble(bus.clone(), panel.clone()).unwrap();
    let (addr, _handle, _queue) = start_test_server(bus.clone()).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/osc", addr))
        .json(&json!({ "from": "athena", "to": "Serafina", "message": "bless us" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    assert_eq!(panel.text(), whisper_core::council::BLESSING_LINE);
    assert_eq!(
        council.get("Lilybear").unwrap().last_message().as_deref(),
        Some("ShadowFlowers: Blessing delivered.")
    );
}

#[tokio::test]
async fn test_agents_and_health_endpoints() {
    let bus = Arc::new(WhisperBus::new());
    let (_b, _) = listening_agent("Serafina", &bus);
    let (_a, _) = listening_agent("Lilybear", &bus);
    let (addr, _handle, _queue) = start_test_server(bus.clone()).await;
    let client = reqwest::Client::new();

    let agents: Value = client
        .get(format!("http://{}/agents", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(agents["agents"], json!(["Lilybear", "Serafina"]));

    let health: Value = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["bus"]["active_subscriptions"], 2);
    assert!(health["timestamp_ms"].as_i64().unwrap() > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_posts_publish_once_each_without_overlap() {
    const POSTS: usize = 32;
    let bus = Arc::new(WhisperBus::new());
    let (_a, seen_a) = listening_agent("A", &bus);
    let (_b, seen_b) = listening_agent("B", &bus);

    // Flags any dispatch that starts while another is still running
    let busy = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let relayed = Arc::new(AtomicUsize::new(0));
    let (flag, overlap_count, relayed_count) = (busy.clone(), overlaps.clone(), relayed.clone());
    bus.subscribe(
        Recipient::Broadcast,
        Arc::new(move |msg: &WhisperMessage| -> Result<()> {
            if flag.swap(true, Ordering::SeqCst) {
                overlap_count.fetch_add(1, Ordering::SeqCst);
            }
            if msg.is_relayed() {
                relayed_count.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(2));
            flag.store(false, Ordering::SeqCst);
            Ok(())
        }),
    );

    let (addr, _handle, _queue) = start_test_server(bus.clone()).await;
    let client = reqwest::Client::new();
    let posts: Vec<_> = (0..POSTS)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .post(format!("http://{}/osc", addr))
                    .json(&json!({ "from": "x", "to": "*", "message": format!("m{}", i) }))
                    .send()
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();
    for post in posts {
        assert_eq!(post.await.unwrap(), reqwest::StatusCode::OK);
    }

    assert_eq!(bus.stats().total_published, POSTS as u64);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(relayed.load(Ordering::SeqCst), POSTS);
    for seen in [&seen_a, &seen_b] {
        assert_eq!(seen.lock().unwrap().len(), POSTS);
        let mut bodies: Vec<String> = seen.lock().unwrap().iter().map(|(_, b)| b.clone()).collect();
        bodies.sort();
        bodies.dedup();
        assert_eq!(bodies.len(), POSTS);
    }
}
