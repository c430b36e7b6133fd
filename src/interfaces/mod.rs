//! Interfaces layer: REST API and WebSocket notifications

pub mod http;
pub mod ws;
