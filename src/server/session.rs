//! Session manager for the networked service
//!
//! Each session is one workspace directory under the manager's base
//! directory, one top-level agent, one filesystem watcher, and at most one
//! live connection. Sessions share nothing mutable with each other; the
//! manager's map is the only cross-session structure and it is never held
//! across an await.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::protocol::{ClientMessage, ServerMessage};
use super::watcher::{self, WatcherHandle};
use crate::agent::{
    AgentCatalog, AgentConfig, AgentController, AgentEvent, EventSink, LogStyle, Spawner,
};
use crate::error::ToolError;
use crate::metrics::{ACTIVE_SESSIONS, FS_UPDATES};
use crate::model::ModelClient;
use crate::security::CommandGuard;
use crate::workspace::{archive, file_tree, CommandExecutor, Sandbox, Workspace};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid session id: {0}")]
    InvalidId(String),
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Invalid archive: {0}")]
    Archive(io::Error),
    #[error("Failed to watch workspace: {0}")]
    Watch(#[from] notify::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

/// Registration of a session's live connection
///
/// Sending while nothing is attached is a no-op. A send that fails
/// because the receiver is gone releases the registration.
#[derive(Debug, Default)]
pub struct ConnectionSlot {
    sender: Mutex<Option<Outbound>>,
}

impl ConnectionSlot {
    pub fn attach(&self, sender: Outbound) {
        if let Ok(mut slot) = self.sender.lock() {
            *slot = Some(sender);
        }
    }

    /// Release the registration if `sender` still holds it
    ///
    /// Returns false when a newer connection has taken the slot.
    pub fn detach(&self, sender: &Outbound) -> bool {
        let Ok(mut slot) = self.sender.lock() else {
            return false;
        };
        match slot.as_ref() {
            Some(current) if current.same_channel(sender) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn release(&self) {
        if let Ok(mut slot) = self.sender.lock() {
            *slot = None;
        }
    }

    pub fn is_attached(&self) -> bool {
        self.sender.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    pub fn send(&self, message: ServerMessage) -> bool {
        let Ok(mut slot) = self.sender.lock() else {
            return false;
        };
        let Some(sender) = slot.as_ref() else {
            return false;
        };
        if sender.send(message).is_err() {
            debug!("Connection gone, releasing registration");
            *slot = None;
            return false;
        }
        true
    }

    pub fn notify_fs_update(&self) {
        if self.send(ServerMessage::FsUpdate) {
            FS_UPDATES.inc();
        }
    }
}

impl EventSink for ConnectionSlot {
    fn emit(&self, event: AgentEvent) {
        match event {
            AgentEvent::Log { style, text } => {
                self.send(ServerMessage::log(style.paint(&text)));
            }
            AgentEvent::FilesChanged => self.notify_fs_update(),
        }
    }
}

pub struct Session {
    id: String,
    workspace: Arc<Workspace>,
    connection: Arc<ConnectionSlot>,
    agent: tokio::sync::Mutex<AgentController>,
    cancel: CancellationToken,
    watcher: Mutex<Option<WatcherHandle>>,
    /// Set at creation, cleared by the first attach
    idle_since: Mutex<Option<Instant>>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Path {
        self.workspace.root()
    }

    pub fn connection(&self) -> &Arc<ConnectionSlot> {
        &self.connection
    }

    /// Register `sender` as the live connection and greet it
    pub fn attach(&self, sender: Outbound) {
        self.connection.attach(sender);
        if let Ok(mut idle) = self.idle_since.lock() {
            *idle = None;
        }
        self.connection.send(ServerMessage::log(
            LogStyle::Info.paint(&format!("Agent initialized in {}", self.root().display())),
        ));
        self.connection.notify_fs_update();
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.lock().map(|w| w.is_some()).unwrap_or(false)
    }

    /// How long the session has sat without ever having a client attached
    pub fn unclaimed_for(&self) -> Option<Duration> {
        let since = (*self.idle_since.lock().ok()?)?;
        Some(since.elapsed())
    }

    /// Run one user turn and report `ready` when it ends
    ///
    /// A turn already in progress is not queued behind; the message is
    /// refused with a log line instead.
    pub async fn run_turn(&self, content: String) {
        let Ok(mut agent) = self.agent.try_lock() else {
            self.connection.send(ServerMessage::log(
                LogStyle::Error.paint("Agent is busy with another message; wait for it to finish."),
            ));
            return;
        };

        self.connection.send(ServerMessage::User {
            content: content.clone(),
        });
        if let Err(e) = agent.send(&content).await {
            warn!(session = %self.id, error = %e, "Turn failed");
            self.connection.emit(AgentEvent::error(&e));
        }
        self.connection.send(ServerMessage::ready());
    }

    /// Contents of a file for the client editor; `None` if it does not exist
    pub async fn read_file(&self, path: &str) -> Result<Option<String>, ToolError> {
        let full = self.workspace.sandbox().resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) if full.is_dir() => {
                debug!(path, error = %e, "Read of a directory");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save_file(&self, path: &str, content: &str) -> Result<(), ToolError> {
        self.workspace.write(path, content).await?;
        Ok(())
    }

    /// Answer one client frame
    ///
    /// A `user_message` runs its whole turn before this returns; the
    /// websocket handler spawns those so the connection stays responsive.
    pub async fn handle(&self, message: ClientMessage) {
        match message {
            ClientMessage::UserMessage { content } => self.run_turn(content).await,
            ClientMessage::GetFileTree => match file_tree(self.root()) {
                Ok(tree) => {
                    self.connection.send(ServerMessage::FileTree { content: tree });
                }
                Err(e) => self.connection.emit(AgentEvent::error(e)),
            },
            ClientMessage::ReadFile { path } => match self.read_file(&path).await {
                Ok(content) => {
                    self.connection
                        .send(ServerMessage::FileContent { path, content });
                }
                Err(e) => self.connection.emit(AgentEvent::error(e)),
            },
            ClientMessage::SaveFile { path, content } => {
                match self.save_file(&path, &content).await {
                    Ok(()) => {
                        self.connection
                            .send(ServerMessage::status(format!("Saved {}", path)));
                        self.connection.notify_fs_update();
                    }
                    Err(e) => self.connection.emit(AgentEvent::error(e)),
                }
            }
        }
    }

    /// Stop the watcher, cancel any running turn and release the connection
    ///
    /// The workspace directory is left on disk.
    fn shutdown(&self) {
        self.cancel.cancel();
        if let Ok(mut watcher) = self.watcher.lock() {
            if let Some(handle) = watcher.take() {
                handle.stop();
            }
        }
        self.connection.release();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("root", &self.root())
            .field("connected", &self.connection.is_attached())
            .field("watching", &self.is_watching())
            .finish()
    }
}

/// Owns every in-memory session
pub struct SessionManager {
    base_dir: PathBuf,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    client: Arc<dyn ModelClient>,
    catalog: Arc<AgentCatalog>,
    config: AgentConfig,
}

impl SessionManager {
    /// Manager storing workspaces under `base_dir`, created if missing
    pub fn new(
        base_dir: impl AsRef<Path>,
        client: Arc<dyn ModelClient>,
        catalog: Arc<AgentCatalog>,
        config: AgentConfig,
    ) -> io::Result<Self> {
        std::fs::create_dir_all(base_dir.as_ref())?;
        Ok(Self {
            base_dir: base_dir.as_ref().canonicalize()?,
            sessions: RwLock::new(HashMap::new()),
            client,
            catalog,
            config,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory of session `id`; the id must be a UUID
    pub fn session_dir(&self, id: &str) -> Result<PathBuf, SessionError> {
        let parsed = Uuid::parse_str(id).map_err(|_| SessionError::InvalidId(id.to_string()))?;
        Ok(self.base_dir.join(parsed.hyphenated().to_string()))
    }

    /// New session with an empty workspace
    pub fn create(&self) -> Result<Arc<Session>, SessionError> {
        let id = Uuid::new_v4().to_string();
        std::fs::create_dir_all(self.session_dir(&id)?)?;
        self.open(&id)
    }

    /// New session whose workspace is the unpacked zip `bytes`
    pub fn create_from_archive(&self, bytes: &[u8]) -> Result<Arc<Session>, SessionError> {
        let id = Uuid::new_v4().to_string();
        let dir = self.session_dir(&id)?;
        std::fs::create_dir_all(&dir)?;

        match archive::extract(bytes, &dir) {
            Ok(files) => info!(session = %id, files, "Extracted upload"),
            Err(e) => {
                let _ = std::fs::remove_dir_all(&dir);
                return Err(SessionError::Archive(e));
            }
        }
        self.open(&id)
    }

    /// The in-memory session for `id`, re-creating it from its directory
    /// if needed
    pub fn open(&self, id: &str) -> Result<Arc<Session>, SessionError> {
        let dir = self.session_dir(id)?;
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "session map poisoned"))?;

        if let Some(session) = sessions.get(id) {
            return Ok(session.clone());
        }
        if !dir.is_dir() {
            return Err(SessionError::NotFound(id.to_string()));
        }

        let session = Arc::new(self.build_session(id, &dir)?);
        sessions.insert(id.to_string(), session.clone());
        ACTIVE_SESSIONS.inc();
        info!(session = %id, root = %dir.display(), "Session opened");
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().ok()?.get(id).cloned()
    }

    /// Drop the in-memory session `id`, keeping its directory
    pub fn close(&self, id: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .ok()
            .and_then(|mut sessions| sessions.remove(id));
        match removed {
            Some(session) => {
                session.shutdown();
                ACTIVE_SESSIONS.dec();
                info!(session = %id, "Session closed");
                true
            }
            None => false,
        }
    }

    /// Close sessions no client has attached to within `max_idle`
    ///
    /// Returns how many were closed. Their directories stay on disk.
    pub fn reap_unclaimed(&self, max_idle: Duration) -> usize {
        let stale: Vec<String> = match self.sessions.read() {
            Ok(sessions) => sessions
                .values()
                .filter(|s| s.unclaimed_for().is_some_and(|idle| idle >= max_idle))
                .map(|s| s.id.clone())
                .collect(),
            Err(_) => return 0,
        };
        let closed = stale.iter().filter(|id| self.close(id)).count();
        if closed > 0 {
            info!(closed, "Reaped unclaimed sessions");
        }
        closed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn build_session(&self, id: &str, dir: &Path) -> Result<Session, SessionError> {
        let executor = CommandExecutor::new(
            Duration::from_secs(self.config.command_timeout_secs),
            CommandGuard::default(),
        );
        let workspace = Arc::new(Workspace::new(Sandbox::new(dir)?, executor));
        let connection = Arc::new(ConnectionSlot::default());
        let cancel = CancellationToken::new();

        let agent = Spawner::new(
            self.client.clone(),
            self.catalog.clone(),
            workspace.clone(),
            self.config.clone(),
            connection.clone(),
        )
        .with_cancellation(cancel.clone())
        .root_agent();

        let notifier = connection.clone();
        let watcher = watcher::watch(workspace.root(), move || notifier.notify_fs_update())?;

        Ok(Session {
            id: id.to_string(),
            workspace,
            connection,
            agent: tokio::sync::Mutex::new(agent),
            cancel,
            watcher: Mutex::new(Some(watcher)),
            idle_since: Mutex::new(Some(Instant::now())),
        })
    }
}
