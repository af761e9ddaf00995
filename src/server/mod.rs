// Server module entry
// Listener setup, connection serving, accept loop and shutdown signals

pub mod connection;
pub mod listener;
pub mod serve;
pub mod signal;

pub use listener::create_reusable_listener;
pub use serve::run_server_loop;
pub use signal::{start_signal_handler, SignalHandler};
