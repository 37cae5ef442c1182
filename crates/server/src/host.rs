//! Host channel: newline-delimited JSON between the editor plugin and this
//! process. Commands arrive on stdin, replies go to stdout.
//!
//! Editor state updates (`visible_files_changed`, `selection_changed`,
//! `selection_cleared`) produce no reply. Operator commands (`start`,
//! `stop`, `status`, `debug_log`) always produce exactly one.

use std::sync::Arc;

use agentlink_protocol::Selection;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::editor::{HostEditorState, SelectionState};
use crate::paths::canonical_project_root;
use crate::session::SessionStatus;
use crate::state::SessionRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostCommand {
    Start {
        project_root: String,
    },
    Stop {
        project_root: String,
    },
    Status,
    DebugLog,
    VisibleFilesChanged {
        project_root: String,
        uris: Vec<String>,
    },
    SelectionChanged {
        project_root: String,
        uri: String,
        #[serde(default)]
        selections: Vec<Selection>,
        start_offset: usize,
        end_offset: usize,
    },
    SelectionCleared {
        project_root: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostReply {
    Started { project_root: String, port: u16 },
    Stopped { project_root: String, was_running: bool },
    Status { sessions: Vec<SessionStatus> },
    DebugLog { lines: Vec<String> },
    Error { message: String },
}

/// Coordinates the session table and the host-fed editor state.
pub struct Host {
    registry: Arc<SessionRegistry>,
    editor: Arc<HostEditorState>,
}

impl Host {
    pub fn new(registry: Arc<SessionRegistry>, editor: Arc<HostEditorState>) -> Self {
        Self { registry, editor }
    }

    pub async fn handle_line(&self, line: &str) -> Option<HostReply> {
        match serde_json::from_str::<HostCommand>(line) {
            Ok(command) => self.handle(command).await,
            Err(e) => {
                warn!(
                    component = "host",
                    event = "host.parse_failed",
                    error = %e,
                    "Failed to parse host command"
                );
                Some(HostReply::Error {
                    message: format!("invalid host command: {e}"),
                })
            }
        }
    }

    pub async fn handle(&self, command: HostCommand) -> Option<HostReply> {
        match command {
            HostCommand::Start { project_root } => Some(self.start(&project_root).await),
            HostCommand::Stop { project_root } => {
                let project_root = canonical_project_root(&project_root);
                let was_running = self.registry.stop(&project_root).await;
                Some(HostReply::Stopped {
                    project_root,
                    was_running,
                })
            }
            HostCommand::Status => Some(HostReply::Status {
                sessions: self.registry.status().await,
            }),
            HostCommand::DebugLog => Some(HostReply::DebugLog {
                lines: self.registry.debug_log().lines(),
            }),
            HostCommand::VisibleFilesChanged { project_root, uris } => {
                let project_root = canonical_project_root(&project_root);
                self.editor.set_visible_files(&project_root, uris);
                self.registry.visible_files_changed(&project_root).await;
                None
            }
            HostCommand::SelectionChanged {
                project_root,
                uri,
                selections,
                start_offset,
                end_offset,
            } => {
                let project_root = canonical_project_root(&project_root);
                let state = SelectionState {
                    uri,
                    selections,
                    start_offset,
                    end_offset,
                };
                let snapshot = state.snapshot();
                self.editor.set_selection(&project_root, state);
                self.registry.selection_changed(&project_root, snapshot).await;
                None
            }
            HostCommand::SelectionCleared { project_root } => {
                self.editor
                    .clear_selection(&canonical_project_root(&project_root));
                None
            }
        }
    }

    /// Start a session; "already running" is reported, not fatal.
    pub async fn start(&self, project_root: &str) -> HostReply {
        let project_root = canonical_project_root(project_root);
        match self.registry.start(&project_root).await {
            Ok(port) => HostReply::Started { project_root, port },
            Err(e) => {
                warn!(
                    component = "host",
                    event = "host.start_failed",
                    project = %project_root,
                    error = %e,
                    "Failed to start session"
                );
                HostReply::Error {
                    message: e.to_string(),
                }
            }
        }
    }
}

/// Read commands until EOF, writing one JSON reply line per operator command.
pub async fn run<R, W>(host: &Host, input: R, mut output: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(reply) = host.handle_line(line).await {
            write_reply(&mut output, &reply).await?;
        }
    }

    info!(
        component = "host",
        event = "host.eof",
        "Host channel closed"
    );
    Ok(())
}

pub async fn write_reply<W: AsyncWrite + Unpin>(output: &mut W, reply: &HostReply) -> anyhow::Result<()> {
    let mut json = serde_json::to_vec(reply)?;
    json.push(b'\n');
    output.write_all(&json).await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::debug_log::DebugLog;
    use serde_json::{json, Value};

    fn host(data_dir: &std::path::Path) -> Host {
        let editor = Arc::new(HostEditorState::new());
        let registry = Arc::new(SessionRegistry::new(
            Config::new(data_dir.to_path_buf()),
            editor.clone(),
            Arc::new(DebugLog::new()),
        ));
        Host::new(registry, editor)
    }

    #[test]
    fn parses_selection_command() {
        let command: HostCommand = serde_json::from_value(json!({
            "type": "selection_changed",
            "project_root": "/p",
            "uri": "file:///p/a.rs",
            "start_offset": 3,
            "end_offset": 7
        }))
        .unwrap();
        assert_eq!(
            command,
            HostCommand::SelectionChanged {
                project_root: "/p".into(),
                uri: "file:///p/a.rs".into(),
                selections: vec![],
                start_offset: 3,
                end_offset: 7,
            }
        );
    }

    #[tokio::test]
    async fn start_status_stop_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let root = project.path().to_string_lossy().to_string();
        let host = host(tmp.path());

        let port = match host.handle(HostCommand::Start { project_root: root.clone() }).await {
            Some(HostReply::Started { port, .. }) => port,
            other => panic!("expected started, got {other:?}"),
        };

        match host.handle(HostCommand::Start { project_root: root.clone() }).await {
            Some(HostReply::Error { message }) => assert!(message.contains("already running")),
            other => panic!("expected error, got {other:?}"),
        }

        match host.handle(HostCommand::Status).await {
            Some(HostReply::Status { sessions }) => {
                assert_eq!(sessions.len(), 1);
                assert_eq!(sessions[0].port, port);
                assert!(!sessions[0].connected);

                let encoded = serde_json::to_value(&sessions[0]).unwrap();
                let created_at = encoded["created_at"].as_str().unwrap();
                assert!(chrono::DateTime::parse_from_rfc3339(created_at).is_ok());
            }
            other => panic!("expected status, got {other:?}"),
        }

        assert!(matches!(
            host.handle(HostCommand::Stop { project_root: root.clone() }).await,
            Some(HostReply::Stopped { was_running: true, .. })
        ));
        assert!(matches!(
            host.handle(HostCommand::Stop { project_root: root.clone() }).await,
            Some(HostReply::Stopped { was_running: false, .. })
        ));
        assert!(!tmp.path().join(format!("{port}.json")).exists());

        match host.handle(HostCommand::Status).await {
            Some(HostReply::Status { sessions }) => assert!(sessions.is_empty()),
            other => panic!("expected status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_replies_only_to_operator_commands() {
        let tmp = tempfile::tempdir().unwrap();
        let host = host(tmp.path());
        let input = concat!(
            "{\"type\":\"visible_files_changed\",\"project_root\":\"/p\",\"uris\":[]}\n",
            "\n",
            "not json\n",
            "{\"type\":\"status\"}\n",
        );

        let mut output = Vec::new();
        run(&host, input.as_bytes(), &mut output).await.unwrap();

        let replies: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["type"], "error");
        assert_eq!(replies[1], json!({"type": "status", "sessions": []}));
    }
}
