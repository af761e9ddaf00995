//! HTTP protocol layer module
//!
//! Response builders, validators and content types shared by the router
//! and the directory store.

pub mod cache;
pub mod mime;
pub mod response;

// Re-export commonly used builders
pub use response::{
    build_304_response, build_400_response, build_404_response, build_405_response,
    build_413_response, build_500_response, build_502_response, build_asset_response,
};
