//! Upstream state gauge before the connector reports anything.
//!
//! Runs in its own test binary so no other test touches the default
//! Prometheus registry.

use relay_app::{AppConfig, Application, UpstreamConfig};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;

/// Test that `connecting` is published as soon as the connector starts,
/// even while the first handshake is still pending.
#[tokio::test]
async fn test_state_gauge_published_on_start() {
    // Accepts TCP via the backlog but never answers the handshake, so the
    // connector emits no event.
    let stalled = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = AppConfig {
        upstream: UpstreamConfig {
            url: format!("ws://{}", stalled.local_addr().unwrap()),
            ..UpstreamConfig::default()
        },
        ..AppConfig::default()
    };

    let before = relay_telemetry::gather_text().unwrap();
    assert!(!before.contains("relay_upstream_state{"));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let app = Application::new(config).unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        app.run_until(listener, async {
            let _ = stop_rx.await;
        })
        .await
    });

    let published = timeout(Duration::from_secs(5), async {
        loop {
            let text = relay_telemetry::gather_text().unwrap();
            if text.contains(r#"relay_upstream_state{state="connecting"} 1"#) {
                return text;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("connecting state published");
    assert!(published.contains(r#"relay_upstream_state{state="connected"} 0"#));

    drop(stop_tx);
    let result = timeout(Duration::from_secs(10), handle).await.unwrap().unwrap();
    assert!(result.is_ok());
    drop(stalled);
}
