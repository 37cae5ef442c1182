//! The editor as seen from the session core.
//!
//! The core never computes line/column ranges or reads buffers itself; it
//! asks an [`EditorContext`] for the current state at the moment it needs
//! it. The binary implements the trait with [`HostEditorState`], a store the
//! editor plugin keeps up to date over the host channel.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use agentlink_protocol::Selection;

/// What the active editor currently shows as selected, ready to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    pub uri: String,
    pub selections: Vec<Selection>,
    /// Raw buffer offsets of the primary selection.
    pub start_offset: usize,
    pub end_offset: usize,
}

impl SelectionState {
    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            uri: self.uri.clone(),
            has_selection: self.start_offset != self.end_offset,
            start: self.start_offset,
            end: self.end_offset,
        }
    }
}

/// Cheap change-detection key for selection updates. Never sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSnapshot {
    pub uri: String,
    pub has_selection: bool,
    pub start: usize,
    pub end: usize,
}

pub trait EditorContext: Send + Sync {
    /// URIs of the files currently visible for `project_root`.
    fn visible_files(&self, project_root: &str) -> Vec<String>;

    /// Current selection for `project_root`, or `None` if there is no active
    /// file belonging to that project.
    fn selection(&self, project_root: &str) -> Option<SelectionState>;
}

#[derive(Debug, Default)]
struct ProjectView {
    visible_files: Vec<String>,
    selection: Option<SelectionState>,
}

/// Editor state pushed by the host process, keyed by project root.
#[derive(Debug, Default)]
pub struct HostEditorState {
    projects: RwLock<HashMap<String, ProjectView>>,
}

impl HostEditorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_visible_files(&self, project_root: &str, uris: Vec<String>) {
        let mut projects = self.projects.write().unwrap_or_else(PoisonError::into_inner);
        projects.entry(project_root.to_string()).or_default().visible_files = uris;
    }

    pub fn set_selection(&self, project_root: &str, selection: SelectionState) {
        let mut projects = self.projects.write().unwrap_or_else(PoisonError::into_inner);
        projects.entry(project_root.to_string()).or_default().selection = Some(selection);
    }

    pub fn clear_selection(&self, project_root: &str) {
        let mut projects = self.projects.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(view) = projects.get_mut(project_root) {
            view.selection = None;
        }
    }
}

impl EditorContext for HostEditorState {
    fn visible_files(&self, project_root: &str) -> Vec<String> {
        self.projects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(project_root)
            .map(|view| view.visible_files.clone())
            .unwrap_or_default()
    }

    fn selection(&self, project_root: &str) -> Option<SelectionState> {
        self.projects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(project_root)
            .and_then(|view| view.selection.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection_at(uri: &str, start: usize, end: usize) -> SelectionState {
        SelectionState {
            uri: uri.to_string(),
            selections: Vec::new(),
            start_offset: start,
            end_offset: end,
        }
    }

    #[test]
    fn snapshot_flags_non_empty_ranges() {
        assert!(!selection_at("file:///a", 4, 4).snapshot().has_selection);
        assert!(selection_at("file:///a", 4, 9).snapshot().has_selection);
    }

    #[test]
    fn state_is_kept_per_project() {
        let editor = HostEditorState::new();
        editor.set_visible_files("/p1", vec!["file:///p1/a.rs".into()]);
        editor.set_selection("/p2", selection_at("file:///p2/b.rs", 0, 3));

        assert_eq!(editor.visible_files("/p1"), vec!["file:///p1/a.rs"]);
        assert!(editor.visible_files("/p2").is_empty());
        assert!(editor.selection("/p1").is_none());
        assert_eq!(editor.selection("/p2").unwrap().uri, "file:///p2/b.rs");

        editor.clear_selection("/p2");
        assert!(editor.selection("/p2").is_none());
    }
}
