//! Bridge Integration Test Module
//!
//! - `e2e_ingest`: POST /osc and the read-only endpoints
//! - `e2e_relay`: outbound relay between two bridges

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use whisper_bridge::server::serve;
use whisper_bridge::{router, DispatchQueue};
use whisper_core::{Agent, AgentName, Result, WhisperBus};

pub type Seen = Arc<Mutex<Vec<(String, String)>>>;

/// Start an ingestion server for `bus` on an ephemeral localhost port
pub async fn start_test_server(
    bus: Arc<WhisperBus>,
) -> (SocketAddr, tokio::task::JoinHandle<()>, DispatchQueue) {
    let (queue, _dispatcher) = DispatchQueue::spawn(Arc::clone(&bus), 64);

    // Bind to 127.0.0.1:0 for an ephemeral port
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().unwrap();
    let app = router(queue.clone(), bus);

    let handle = tokio::spawn(async move {
        serve(listener, app, std::future::pending())
            .await
            .expect("server exited cleanly");
    });

    (addr, handle, queue)
}

/// Active agent that records every (from, body) it is told
pub fn listening_agent(name: &str, bus: &Arc<WhisperBus>) -> (Arc<Agent>, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let agent = Agent::new(
        AgentName::new(name).unwrap(),
        "test",
        bus.clone(),
        move |_: &Agent, from: &str, body: &str| -> Result<()> {
            sink.lock().unwrap().push((from.to_string(), body.to_string()));
            Ok(())
        },
    );
    agent.activate();
    (agent, seen)
}

/// Poll `seen` until it holds `n` entries or two seconds pass
pub async fn wait_for(seen: &Seen, n: usize) -> Vec<(String, String)> {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
    loop {
        let current = seen.lock().unwrap().clone();
        if current.len() >= n || tokio::time::Instant::now() >= deadline {
            return current;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}

mod e2e_ingest;
