//! HTTP transport for the demo server
//!
//! Carries request text in a POST body and returns the dispatcher's reply.

pub mod handlers;
