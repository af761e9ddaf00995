// Server loop module
// Accepts connections until shutdown, then waits briefly for in-flight work

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Accept loop; returns once `shutdown` is notified.
///
/// After the listener closes, active connections get up to `write_timeout`
/// seconds to finish before the loop returns.
pub async fn run_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    active_connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
) {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = shutdown.notified() => {
                break;
            }
        }
    }

    drop(listener);
    let grace = Duration::from_secs(state.config.performance.write_timeout);
    drain_connections(&active_connections, grace).await;
}

/// Wait until the counter reaches zero or `grace` elapses
async fn drain_connections(active_connections: &AtomicUsize, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;
    loop {
        let remaining = active_connections.load(Ordering::SeqCst);
        if remaining == 0 {
            logger::log_info("All connections closed");
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "Shutting down with {remaining} connection(s) still active"
            ));
            return;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::create_reusable_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn state_for(root: &std::path::Path) -> Arc<AppState> {
        let mut cfg: Config = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 0

            [logging]
            level = "error"
            access_log = false
            show_headers = false

            [performance]
            keep_alive_timeout = 0
            read_timeout = 5
            write_timeout = 1

            [http]
            server_name = "loop-test"
            max_body_size = 1024
            "#,
        )
        .unwrap();
        cfg.store = crate::config::StoreConfig::Directory {
            root: root.display().to_string(),
        };
        Arc::new(AppState::new(cfg).unwrap())
    }

    #[tokio::test]
    async fn test_serves_alias_over_tcp_and_shuts_down() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("hero-image.webp"), b"webp-bytes").unwrap();

        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let server = tokio::task::spawn_local(run_server_loop(
                    listener,
                    state_for(tmp.path()),
                    Arc::clone(&counter),
                    Arc::clone(&shutdown),
                ));

                let mut stream = TcpStream::connect(addr).await.unwrap();
                stream
                    .write_all(b"GET /hero-image HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
                    .await
                    .unwrap();
                let mut raw = Vec::new();
                stream.read_to_end(&mut raw).await.unwrap();
                let text = String::from_utf8_lossy(&raw);
                assert!(text.starts_with("HTTP/1.1 200 OK"), "got: {text}");
                assert!(text.contains("content-type: image/webp"));
                assert!(text.ends_with("webp-bytes"));

                shutdown.notify_one();
                server.await.unwrap();
            })
            .await;
    }
}
