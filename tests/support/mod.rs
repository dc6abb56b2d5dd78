// Shared primitives for one-time server bootstrapping across integration tests.
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use tabletop_server::Settings;

// Global base URL used by all tests after the server publishes its bound address.
static SERVER_URL: OnceLock<String> = OnceLock::new();
// One-time guard that ensures the server bootstrap path runs only once.
static SERVER_READY: OnceLock<()> = OnceLock::new();

// Ensure the test server is running and return the shared base URL.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        // Local one-time slot where the server thread publishes its selected URL.
        let published_url = Arc::new(OnceLock::<String>::new());
        let published_url_thread = Arc::clone(&published_url);
        // Spawn an OS thread so the server outlives individual `#[tokio::test]` runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                // Bind to an ephemeral port to avoid collisions with local services.
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_url_thread.set(format!("http://{}", addr));
                // In-memory storage keeps the suite independent of PostgreSQL.
                let settings = Settings {
                    secret_key: "integration-tests".to_string(),
                    ..Settings::default()
                };
                tabletop_server::run(listener, settings)
                    .await
                    .expect("server failed");
            });
        });
        wait_for_server_url_and_readiness(published_url);
    });

    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

// Wait for URL publication and then wait for the server socket to accept TCP connections.
fn wait_for_server_url_and_readiness(published_url: Arc<OnceLock<String>>) {
    let base_url = loop {
        if let Some(url) = published_url.get() {
            break url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let _ = SERVER_URL.set(base_url.clone());

    // Strip the scheme so we can use host:port for raw TCP readiness checks.
    let addr = base_url
        .strip_prefix("http://")
        .expect("base url should use http://");

    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("server did not become ready in time");
}

// Registers a fresh account and returns its bearer token.
pub async fn sign_in(client: &reqwest::Client, base_url: &str, prefix: &str) -> String {
    let username = format!("{prefix}-{}", uuid::Uuid::new_v4().simple());
    let res = client
        .put(format!("{base_url}/api/v1/register/"))
        .json(&serde_json::json!({
            "email": format!("{username}@example.com"),
            "username": username,
            "password": "correct horse",
        }))
        .send()
        .await
        .expect("register request should succeed");
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);

    let res = client
        .post(format!("{base_url}/api/v1/login/token"))
        .form(&[("username", username.as_str()), ("password", "correct horse")])
        .send()
        .await
        .expect("login request should succeed");
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = res.json().await.expect("login body should be json");
    body["access_token"]
        .as_str()
        .expect("login should return an access token")
        .to_string()
}
