//! Live check-in feed: organizers keep a WebSocket open at the door and
//! receive a message for every pass scanned at the events they watch.

pub mod connection;
pub mod dispatcher;
