pub mod auth;
pub mod billing;
pub mod chat;
pub mod middleware;
pub mod rest;
pub mod state;

// Re-export the handlers the binary wires into the router.
pub use billing::{checkout_handler, webhook_handler};
pub use chat::chat_stream_handler;
pub use middleware::require_auth;
pub use rest::{
    account_handler, create_session_handler, current_session_handler, list_sessions_handler,
    session_messages_handler,
};
