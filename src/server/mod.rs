//! HTTP server for Wheelhouse

pub mod http;

pub use http::{run, AppState};
