//! JSON-RPC 2.0 protocol handling
//!
//! Request classification and dispatch, response envelopes, the per-call
//! context handed to procedures, and request builders for callers.

pub mod client;
pub mod context;
pub mod dispatcher;
pub mod response;
