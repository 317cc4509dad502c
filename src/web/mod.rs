//! Control-plane web servers

pub mod auth;
pub mod handlers;
pub mod server;
pub mod templates;
pub mod websocket;

pub use server::{AppState, WebServer};
