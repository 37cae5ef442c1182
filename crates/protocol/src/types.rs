//! Payload types shared across the protocol

use serde::{Deserialize, Serialize};

/// Zero-based line / character position in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// One selection (or bare cursor) in the active editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub range: Range,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_empty: bool,
}

// -- Request / result payloads --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateParams {
    pub auth_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateResult {
    pub authenticated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingParams {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResult {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFileParams {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFileResult {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditFileParams {
    pub path: String,
    pub old_text: String,
    pub new_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditFileResult {
    pub path: String,
    pub replaced: u32,
}

/// Discovery document written to `<data-dir>/<port>.json` while a session listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockfileDocument {
    pub workspace_folders: Vec<String>,
    pub port: u16,
    pub ide_name: String,
    pub auth_token: String,
    pub pid: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lockfile_uses_camel_case_keys() {
        let doc = LockfileDocument {
            workspace_folders: vec!["/home/dev/project".to_string()],
            port: 40123,
            ide_name: "helix".to_string(),
            auth_token: "a".repeat(32),
            pid: 4242,
        };
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({
                "workspaceFolders": ["/home/dev/project"],
                "port": 40123,
                "ideName": "helix",
                "authToken": "a".repeat(32),
                "pid": 4242
            })
        );
    }

    #[test]
    fn edit_params_accept_camel_case() {
        let params: EditFileParams = serde_json::from_value(json!({
            "path": "src/lib.rs",
            "oldText": "foo",
            "newText": "bar"
        }))
        .unwrap();
        assert_eq!(params.old_text, "foo");
        assert_eq!(params.new_text, "bar");
    }
}
