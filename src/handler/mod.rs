//! Request handler module
//!
//! Request dispatch into the rewriter and response post-processing.

pub mod router;

// Re-export main entry point
pub use router::handle_request;
