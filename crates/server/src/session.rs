//! A running session: one loopback listener per project, its credentials,
//! its lockfile, its connection slot and its selection debouncer.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use agentlink_protocol::{LockfileDocument, ServerNotification};
use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::auth::AuthToken;
use crate::config::Config;
use crate::debounce::SelectionDebouncer;
use crate::debug_log::DebugLog;
use crate::dispatch::Dispatcher;
use crate::editor::{EditorContext, SelectionSnapshot};
use crate::error::SessionError;
use crate::lockfile;
use crate::notify::NotificationSender;
use crate::paths;
use crate::websocket::ws_handler;

/// State shared between the session and its connection handlers.
pub struct SessionShared {
    pub project_root: Arc<str>,
    pub auth_token: AuthToken,
    pub version: String,
    pub notifier: NotificationSender,
    pub dispatcher: Dispatcher,
    pub editor: Arc<dyn EditorContext>,
    pub debug_log: Arc<DebugLog>,
}

/// Operator-facing view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub project_root: String,
    pub project_name: String,
    pub port: u16,
    pub connected: bool,
    pub created_at: DateTime<Utc>,
}

pub struct Session {
    shared: Arc<SessionShared>,
    port: u16,
    created_at: DateTime<Utc>,
    data_dir: PathBuf,
    debouncer: Mutex<SelectionDebouncer>,
    server_task: JoinHandle<()>,
}

impl Session {
    /// Bind a loopback listener, start serving, and publish the lockfile.
    ///
    /// If the lockfile cannot be written the listener is torn down again.
    pub async fn start(
        config: &Config,
        project_root: &str,
        editor: Arc<dyn EditorContext>,
        debug_log: Arc<DebugLog>,
    ) -> Result<Self, SessionError> {
        let auth_token = AuthToken::generate().map_err(|_| SessionError::TokenGeneration)?;

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .map_err(SessionError::Bind)?;
        let port = listener.local_addr().map_err(SessionError::Bind)?.port();

        let project_root: Arc<str> = Arc::from(project_root);
        let shared = Arc::new(SessionShared {
            project_root: Arc::clone(&project_root),
            auth_token,
            version: config.version.clone(),
            notifier: NotificationSender::new(Arc::clone(&project_root), Arc::clone(&debug_log)),
            dispatcher: Dispatcher::with_builtin_handlers(config.require_auth),
            editor,
            debug_log,
        });

        let app = Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&shared));

        let serve_root = Arc::clone(&project_root);
        let server_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!(
                    component = "session",
                    event = "session.serve_failed",
                    project = %serve_root,
                    error = %e,
                    "Listener stopped with an error"
                );
            }
        });

        let doc = LockfileDocument {
            workspace_folders: vec![project_root.to_string()],
            port,
            ide_name: config.ide_name.clone(),
            auth_token: shared.auth_token.as_str().to_string(),
            pid: std::process::id(),
        };
        if let Err(e) = lockfile::write(&config.data_dir, &doc) {
            server_task.abort();
            return Err(e.into());
        }

        info!(
            component = "session",
            event = "session.started",
            project = %project_root,
            port,
            "Session listening on 127.0.0.1:{port}"
        );

        Ok(Self {
            shared,
            port,
            created_at: Utc::now(),
            data_dir: config.data_dir.clone(),
            debouncer: Mutex::new(SelectionDebouncer::new(config.debounce)),
            server_task,
        })
    }

    pub fn project_root(&self) -> &str {
        &self.shared.project_root
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    #[cfg(test)]
    pub fn auth_token(&self) -> &AuthToken {
        &self.shared.auth_token
    }

    pub fn is_connected(&self) -> bool {
        self.shared.notifier.is_connected()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            project_root: self.project_root().to_string(),
            project_name: paths::project_name(self.project_root()),
            port: self.port,
            connected: self.is_connected(),
            created_at: self.created_at,
        }
    }

    /// Feed a selection signal through the debouncer. The eventual
    /// notification carries the editor state at fire time.
    pub fn selection_changed(&self, snapshot: SelectionSnapshot) {
        let shared = Arc::clone(&self.shared);
        let fire = move || {
            let Some(state) = shared.editor.selection(&shared.project_root) else {
                debug!(
                    component = "session",
                    event = "selection.dropped",
                    project = %shared.project_root,
                    "No selection to report at fire time"
                );
                return;
            };
            shared.notifier.send(ServerNotification::SelectionDidChange {
                uri: state.uri,
                selections: state.selections,
            });
        };

        self.debouncer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .signal(snapshot, fire);
    }

    /// Push the current visible files immediately.
    pub fn visible_files_changed(&self) {
        let uris = self.shared.editor.visible_files(&self.shared.project_root);
        self.shared
            .notifier
            .send(ServerNotification::VisibleFilesDidChange { uris });
    }

    /// Tear down in reverse creation order: pending timer, peer, listener,
    /// lockfile. In-flight frames are not drained.
    pub fn shutdown(self) {
        self.debouncer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
        self.shared.notifier.close_peer();
        self.server_task.abort();

        if let Err(e) = lockfile::remove(&self.data_dir, self.port) {
            warn!(
                component = "session",
                event = "session.lockfile_remove_failed",
                project = %self.shared.project_root,
                error = %e,
                "Failed to remove lockfile"
            );
        }

        info!(
            component = "session",
            event = "session.stopped",
            project = %self.shared.project_root,
            port = self.port,
            "Session stopped"
        );
    }
}
