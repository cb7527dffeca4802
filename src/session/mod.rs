//! Per-user session management
//!
//! This module provides the session bookkeeping behind the HTTP API:
//! - `UserSession`: streaming flag + recording slot, serialized by a mutex
//! - `SessionStore`: injectable storage, `InMemorySessionStore` by default
//! - Idle eviction of abandoned sessions

mod session;
mod stats;
mod store;
mod sweeper;

pub use session::{SessionGuard, SessionState, UserSession};
pub use stats::SessionSnapshot;
pub use store::{InMemorySessionStore, SessionStore};
pub use sweeper::{spawn_idle_sweeper, sweep_idle};
