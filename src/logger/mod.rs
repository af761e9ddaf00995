//! Logger module
//!
//! Provides logging utilities for the proxy:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Leveled error, warning and debug messages
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::{Config, LogLevel};
use std::net::SocketAddr;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        config.logging.level,
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

/// Level threshold, `info` before `init`
fn level() -> LogLevel {
    writer::get().map_or(LogLevel::Info, writer::LogWriter::level)
}

fn enabled(at: LogLevel) -> bool {
    at <= level()
}

pub fn debug_enabled() -> bool {
    enabled(LogLevel::Debug)
}

/// Write to info/access log
fn write_info(message: &str) {
    if !enabled(LogLevel::Info) {
        return;
    }
    match writer::get() {
        Some(w) => w.write_info(message),
        None => println!("{message}"),
    }
}

/// Write to error log
fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

/// Write to access log specifically
fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config, store_kind: &str) {
    write_info("======================================");
    write_info("Asset alias proxy started");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    write_info(&format!("Asset store: {store_kind}"));
    write_info(&format!(
        "Fallback extension: .{}",
        config.rewrite.effective_fallback()
    ));
    for entry in &config.rewrite.special_path_overrides {
        write_info(&format!("Override: {} -> .{}", entry.path, entry.extension));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================\n");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write_info(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    if enabled(LogLevel::Warn) {
        write_error(&format!("[WARN] {message}"));
    }
}

pub fn log_info(message: &str) {
    write_info(&format!("[INFO] {message}"));
}

pub fn log_debug(message: &str) {
    if debug_enabled() {
        write_info(&format!("[DEBUG] {message}"));
    }
}

pub fn log_headers_count(count: usize, show: bool) {
    if show {
        write_info(&format!("[Headers] Count: {count}"));
    }
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}

pub fn log_shutdown(signal: &str) {
    write_info(&format!("\n[Shutdown] {signal} received, no longer accepting connections"));
}
