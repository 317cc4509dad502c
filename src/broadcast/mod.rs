//! Chunk fan-out to connected viewers

pub mod hub;
pub mod relay;

pub use hub::{BroadcastHub, ViewerId};
pub use relay::RelayWorker;
