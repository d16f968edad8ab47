//! WebSocket live history feed.
//!
//! Each connection belongs to one identity and receives a full snapshot of
//! its history on connect and after every change.

mod handler;

pub use handler::live_history;
