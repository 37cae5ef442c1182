//! Session table: project root → running session.
//!
//! Owned by the process's coordinating object and shared by `Arc`. The
//! table lock is held across bind so two concurrent starts for one project
//! cannot both create a session.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::config::Config;
use crate::debug_log::DebugLog;
use crate::editor::{EditorContext, SelectionSnapshot};
use crate::error::SessionError;
use crate::session::{Session, SessionStatus};

pub struct SessionRegistry {
    config: Config,
    editor: Arc<dyn EditorContext>,
    debug_log: Arc<DebugLog>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new(config: Config, editor: Arc<dyn EditorContext>, debug_log: Arc<DebugLog>) -> Self {
        Self {
            config,
            editor,
            debug_log,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn debug_log(&self) -> &Arc<DebugLog> {
        &self.debug_log
    }

    /// Start a session for `project_root` and return its port.
    ///
    /// Fails with [`SessionError::AlreadyRunning`] if one exists; the
    /// existing session keeps its port.
    pub async fn start(&self, project_root: &str) -> Result<u16, SessionError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(project_root) {
            return Err(SessionError::AlreadyRunning {
                project_root: project_root.to_string(),
                port: existing.port(),
            });
        }

        let session = Session::start(
            &self.config,
            project_root,
            Arc::clone(&self.editor),
            Arc::clone(&self.debug_log),
        )
        .await?;
        let port = session.port();
        sessions.insert(project_root.to_string(), session);
        Ok(port)
    }

    /// Stop the session for `project_root`. Returns `false` when there was
    /// nothing to stop, which callers treat as success.
    pub async fn stop(&self, project_root: &str) -> bool {
        let removed = self.sessions.lock().await.remove(project_root);
        match removed {
            Some(session) => {
                session.shutdown();
                true
            }
            None => {
                info!(
                    component = "registry",
                    event = "session.stop_noop",
                    project = %project_root,
                    "No session to stop"
                );
                false
            }
        }
    }

    /// Stop every session; used on process exit.
    pub async fn stop_all(&self) {
        let drained: Vec<Session> = self.sessions.lock().await.drain().map(|(_, s)| s).collect();
        for session in drained {
            session.shutdown();
        }
    }

    pub async fn status(&self) -> Vec<SessionStatus> {
        let mut statuses: Vec<_> = self
            .sessions
            .lock()
            .await
            .values()
            .map(Session::status)
            .collect();
        statuses.sort_by(|a, b| a.project_root.cmp(&b.project_root));
        statuses
    }

    #[cfg(test)]
    pub async fn port_of(&self, project_root: &str) -> Option<u16> {
        self.sessions.lock().await.get(project_root).map(Session::port)
    }

    #[cfg(test)]
    pub async fn is_connected(&self, project_root: &str) -> bool {
        self.sessions
            .lock()
            .await
            .get(project_root)
            .is_some_and(Session::is_connected)
    }

    /// Route a selection signal to the project's debouncer. Signals for
    /// projects without a session are ignored.
    pub async fn selection_changed(&self, project_root: &str, snapshot: SelectionSnapshot) {
        if let Some(session) = self.sessions.lock().await.get(project_root) {
            session.selection_changed(snapshot);
        }
    }

    pub async fn visible_files_changed(&self, project_root: &str) {
        if let Some(session) = self.sessions.lock().await.get(project_root) {
            session.visible_files_changed();
        }
    }

    #[cfg(test)]
    pub async fn auth_token_of(&self, project_root: &str) -> Option<String> {
        self.sessions
            .lock()
            .await
            .get(project_root)
            .map(|s| s.auth_token().as_str().to_string())
    }
}
