use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

mod config;
mod error;
mod handler;
mod http;
mod logger;
mod rewrite;
mod server;
mod store;

/// Config file used when no path is given (extension is resolved by the loader)
const DEFAULT_CONFIG_PATH: &str = "config";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    // Create Tokio runtime, sizing the worker pool from config
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_reusable_listener(addr)?;

    let state = Arc::new(config::AppState::new(cfg)?);
    logger::log_server_start(&addr, &state.config, state.store_kind());
    for rule in state.rewriter.rules().rules() {
        logger::log_debug(&format!("[Rules] {rule}: {:?} -> {:?}", rule.matcher, rule.strategy));
    }

    let signals = Arc::new(server::SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals))?;

    let active_connections = Arc::new(AtomicUsize::new(0));

    // Connections are served with spawn_local
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::run_server_loop(
            listener,
            state,
            active_connections,
            Arc::clone(&signals.shutdown),
        ))
        .await;

    logger::log_info("Server stopped");
    Ok(())
}
