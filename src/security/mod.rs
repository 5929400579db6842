//! Security module for agent workspaces
//!
//! Confinement of an agent's tools comes in layers of very different
//! strength:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Layer 1: SANDBOX PATHS  (workspace::Sandbox)                   │
//! │  Every file path is canonicalized and must stay under the root  │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Layer 2: COMMAND GUARD  (best effort)                          │
//! │  Substring deny-list over shell input, rejected before spawn    │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Layer 3: TIMEOUT                                               │
//! │  Process group SIGKILLed once the wall-clock budget runs out    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only layer 1 is a guarantee. Shell commands run with the host user's
//! permissions and can reach outside the root.

pub mod guard;

pub use guard::{CommandGuard, DEFAULT_DENY_LIST};
