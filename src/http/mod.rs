//! HTTP API for the radio player front-ends
//!
//! This module provides the session-aware endpoints:
//! - POST /start-recording - Start recording the live stream
//! - POST /stop-recording - Stop and download the MP3
//! - POST /stream/start-stream, POST /stop-stream - Listening flag
//! - GET /status - Session status
//! - GET /stream - Live audio relay (also GET /proxyStream)
//! - GET /, GET /health - Health checks
//!
//! Every request first passes the identity middleware, which resolves the
//! caller's user ID.

mod handlers;
mod identity;
mod routes;
mod state;

pub use identity::{identity_cookie, is_valid_user_id, UserId, USER_ID_COOKIE, USER_ID_HEADER};
pub use routes::create_router;
pub use state::AppState;
