#![allow(dead_code)] // Test helpers appear unused when compiled independently

use machinestate::{build_router, FileDayStore, StateService};
use reqwest::Client;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const WAIT_ATTEMPTS: usize = 50;
const WAIT_DELAY: Duration = Duration::from_millis(100);

/// A machinestate router served on a loopback port.
pub struct TestServer {
    pub base_url: String,
    pub service: Arc<StateService<FileDayStore>>,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

/// Find an available TCP port
pub async fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Best-effort check for whether binding to loopback is permitted in the current sandbox.
pub async fn can_bind_loopback() -> bool {
    match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => false,
        Err(_) => true, // treat other errors as non-fatal for skipping
    }
}

/// Start a server over a day store in `data_dir` and wait until it is healthy.
pub async fn spawn_server(client: &Client, data_dir: &Path, debug_routes: bool) -> TestServer {
    let store = FileDayStore::open(data_dir).expect("failed to open day store");
    let service = Arc::new(StateService::new(store));
    let app = build_router(Arc::clone(&service), debug_routes);

    let port = free_port().await;
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("failed to bind machinestate listener");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(err) = server.await {
            eprintln!("machinestate server error: {}", err);
        }
    });

    let base_url = format!("http://127.0.0.1:{}", port);
    wait_for_health(client, &base_url).await;

    TestServer {
        base_url,
        service,
        shutdown_tx,
        handle,
    }
}

/// Wait for a server to respond to /health
pub async fn wait_for_health(client: &Client, base_url: &str) {
    poll_until(|| async {
        client
            .get(format!("{}/health", base_url))
            .send()
            .await
            .ok()
            .map(|_| ())
    })
    .await
    .unwrap_or_else(|| panic!("timed out waiting for {} to be healthy", base_url));
}

/// POST a state report and assert it was acknowledged.
pub async fn post_state(client: &Client, server: &TestServer, body: serde_json::Value) {
    let resp = client
        .post(server.url("/api/machine_state"))
        .json(&body)
        .send()
        .await
        .expect("failed to send report");
    assert!(
        resp.status().is_success(),
        "report was not acknowledged: {:?}",
        resp.status()
    );
}

/// GET a path and decode the JSON body.
pub async fn get_json(client: &Client, server: &TestServer, path: &str) -> serde_json::Value {
    client
        .get(server.url(path))
        .send()
        .await
        .expect("failed to send request")
        .json()
        .await
        .expect("response was not JSON")
}

async fn poll_until<T, F, Fut>(mut f: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for _ in 0..WAIT_ATTEMPTS {
        if let Some(result) = f().await {
            return Some(result);
        }
        tokio::time::sleep(WAIT_DELAY).await;
    }
    None
}
