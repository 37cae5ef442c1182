//! Built-in request handlers.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use agentlink_protocol::{
    AuthenticateParams, AuthenticateResult, EditFileParams, EditFileResult, PingParams,
    PingResult, ReadFileParams, ReadFileResult,
};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::dispatch::{RequestContext, RequestHandler};
use crate::error::RequestError;

fn parse<T: DeserializeOwned>(params: &Value) -> Result<T, RequestError> {
    T::deserialize(params).map_err(RequestError::invalid_params)
}

fn to_payload<T: Serialize>(result: T) -> Result<Value, RequestError> {
    serde_json::to_value(result).map_err(|e| RequestError::internal(e.to_string()))
}

/// `authenticate({authToken})` → `{authenticated}`. Never errors.
pub struct Authenticate;

impl RequestHandler for Authenticate {
    fn handle<'a>(
        &'a self,
        params: &'a Value,
        ctx: &'a mut RequestContext,
    ) -> BoxFuture<'a, Result<Value, RequestError>> {
        Box::pin(async move {
            let authenticated = parse::<AuthenticateParams>(params)
                .map(|p| ctx.auth_token.matches(&p.auth_token))
                .unwrap_or(false);
            ctx.authenticated = authenticated;

            if authenticated {
                info!(
                    component = "dispatch",
                    event = "auth.accepted",
                    connection_id = ctx.connection_id,
                    "Peer authenticated"
                );
            } else {
                warn!(
                    component = "dispatch",
                    event = "auth.rejected",
                    connection_id = ctx.connection_id,
                    "Peer sent a mismatched auth token"
                );
            }
            to_payload(AuthenticateResult { authenticated })
        })
    }
}

/// `ping({message})` → `{message}`.
pub struct Ping;

impl RequestHandler for Ping {
    fn handle<'a>(
        &'a self,
        params: &'a Value,
        _ctx: &'a mut RequestContext,
    ) -> BoxFuture<'a, Result<Value, RequestError>> {
        Box::pin(async move {
            let PingParams { message } = parse(params)?;
            to_payload(PingResult { message })
        })
    }
}

/// `readFile({path})` → `{path, content}`, confined to the project root.
pub struct ReadFile;

impl RequestHandler for ReadFile {
    fn handle<'a>(
        &'a self,
        params: &'a Value,
        ctx: &'a mut RequestContext,
    ) -> BoxFuture<'a, Result<Value, RequestError>> {
        Box::pin(async move {
            let ReadFileParams { path } = parse(params)?;
            let resolved = resolve_in_project(&ctx.project_root, &path).await?;
            let content = tokio::fs::read_to_string(&resolved)
                .await
                .map_err(|e| io_error(&path, e))?;
            to_payload(ReadFileResult { path, content })
        })
    }
}

/// `editFile({path, oldText, newText})` → `{path, replaced}`.
///
/// `oldText` must occur exactly once in the file.
pub struct EditFile;

impl RequestHandler for EditFile {
    fn handle<'a>(
        &'a self,
        params: &'a Value,
        ctx: &'a mut RequestContext,
    ) -> BoxFuture<'a, Result<Value, RequestError>> {
        Box::pin(async move {
            let EditFileParams {
                path,
                old_text,
                new_text,
            } = parse(params)?;
            if old_text.is_empty() {
                return Err(RequestError::invalid_params("oldText must not be empty"));
            }

            let resolved = resolve_in_project(&ctx.project_root, &path).await?;
            let content = tokio::fs::read_to_string(&resolved)
                .await
                .map_err(|e| io_error(&path, e))?;

            let at = match occurrences(&content, &old_text).as_slice() {
                [] => return Err(RequestError::conflict(format!("oldText not found in {path}"))),
                [at] => *at,
                many => {
                    return Err(RequestError::conflict(format!(
                        "oldText matches {} times in {path}",
                        many.len()
                    )))
                }
            };

            let mut updated = content;
            updated.replace_range(at..at + old_text.len(), &new_text);
            write_atomically(&resolved, updated.as_bytes())
                .await
                .map_err(|e| io_error(&path, e))?;

            info!(
                component = "dispatch",
                event = "file.edited",
                connection_id = ctx.connection_id,
                path = %resolved.display(),
                "Applied edit"
            );
            to_payload(EditFileResult { path, replaced: 1 })
        })
    }
}

/// Byte offsets of every occurrence of `needle`, overlapping ones included.
fn occurrences(haystack: &str, needle: &str) -> Vec<usize> {
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let at = from + pos;
        found.push(at);
        from = at + haystack[at..].chars().next().map_or(1, char::len_utf8);
    }
    found
}

/// Replace `path` through a sibling temp file and a rename, keeping the
/// original permissions. Readers see either the old or the new content.
async fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let permissions = tokio::fs::metadata(path).await?.permissions();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{file_name}.agentlink.tmp"));

    let result = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::set_permissions(&tmp_path, permissions).await?;
        tokio::fs::rename(&tmp_path, path).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    result
}

/// Resolve a request path (absolute, project-relative, or `file://` URI) and
/// require that it lands inside the project root after symlinks.
async fn resolve_in_project(project_root: &str, requested: &str) -> Result<PathBuf, RequestError> {
    let requested_path = Path::new(requested.strip_prefix("file://").unwrap_or(requested));
    let joined = if requested_path.is_absolute() {
        requested_path.to_path_buf()
    } else {
        Path::new(project_root).join(requested_path)
    };

    let resolved = tokio::fs::canonicalize(&joined)
        .await
        .map_err(|e| io_error(requested, e))?;
    let root = tokio::fs::canonicalize(project_root)
        .await
        .map_err(|e| io_error(project_root, e))?;

    if !resolved.starts_with(&root) {
        return Err(RequestError::forbidden(format!(
            "{requested} is outside the project root"
        )));
    }
    Ok(resolved)
}

fn io_error(path: &str, err: std::io::Error) -> RequestError {
    match err.kind() {
        ErrorKind::NotFound => RequestError::not_found(format!("{path} not found")),
        ErrorKind::PermissionDenied => RequestError::forbidden(format!("{path}: permission denied")),
        _ => RequestError::internal(format!("{path}: {err}")),
    }
}
