//! Agent module: the tool-calling conversation loop
//!
//! # Architecture
//!
//! ```text
//! User message → AgentController → ModelClient (history + tool schemas)
//!                     ↓
//!           Tool calls, one at a time, in order
//!                     ↓
//!           Dispatcher ── allow-list check ──→ ToolNotAllowed
//!                     ↓
//!     bash / read_file / write_file / edit_file → Workspace
//!     TodoWrite                                 → TodoList (per agent)
//!     Task → Spawner → fresh AgentController (isolated history)
//!                     ↓
//!           Tool messages appended → Loop or Complete
//! ```

pub mod catalog;
pub mod controller;
pub mod dispatcher;
pub mod events;
pub mod subagent;
pub mod todo;
pub mod tools;

pub use catalog::{AgentCatalog, AgentType};
pub use controller::{AgentConfig, AgentController, AgentError, AgentResult, DriverState};
pub use dispatcher::Dispatcher;
pub use events::{AgentEvent, CollectingSink, EventSink, LogStyle, NullSink};
pub use subagent::{Spawner, NO_SUBAGENT_TEXT};
pub use todo::{TodoDraft, TodoItem, TodoList, TodoStatus, MAX_TODOS};
pub use tools::{ToolInvocation, ToolName, ToolSet};
