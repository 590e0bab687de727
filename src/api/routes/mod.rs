//! Thin Axum route handlers (§4.11, §9): health, push, and the WebSocket
//! upgrade live in `api::websocket`.

pub mod health;
pub mod push;
