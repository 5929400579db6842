//! Networked session service
//!
//! ```text
//! client ──ws──► routes ──► SessionManager ──► Session
//!                                               ├─ AgentController (one turn at a time)
//!                                               ├─ ConnectionSlot  (log / status / fs_update)
//!                                               └─ watcher         (external changes)
//! ```

pub mod protocol;
pub mod routes;
pub mod session;
pub mod watcher;

pub use protocol::{ClientMessage, ServerMessage};
pub use routes::{create_router, ApiError, AppState};
pub use session::{ConnectionSlot, Session, SessionError, SessionManager};
