//! Request dispatcher: decode a frame, route by method, produce one response.
//!
//! Handlers are registered by method name; adding a method never touches
//! the decode/route/respond path.

use std::collections::HashMap;
use std::sync::Arc;

use agentlink_protocol::{methods, ClientRequest, DecodeError, ServerResponse};
use futures::future::BoxFuture;
use serde_json::Value;

use crate::auth::AuthToken;
use crate::error::RequestError;
use crate::handlers;

/// Methods reachable before `authenticate` succeeds when auth is required.
const OPEN_METHODS: &[&str] = &[methods::AUTHENTICATE, methods::PING];

/// Per-connection state visible to handlers.
#[derive(Debug)]
pub struct RequestContext {
    pub connection_id: u64,
    pub project_root: Arc<str>,
    pub auth_token: AuthToken,
    pub authenticated: bool,
}

impl RequestContext {
    pub fn new(connection_id: u64, project_root: Arc<str>, auth_token: AuthToken) -> Self {
        Self {
            connection_id,
            project_root,
            auth_token,
            authenticated: false,
        }
    }
}

pub trait RequestHandler: Send + Sync {
    fn handle<'a>(
        &'a self,
        params: &'a Value,
        ctx: &'a mut RequestContext,
    ) -> BoxFuture<'a, Result<Value, RequestError>>;
}

pub struct Dispatcher {
    handlers: HashMap<&'static str, Box<dyn RequestHandler>>,
    require_auth: bool,
}

impl Dispatcher {
    pub fn new(require_auth: bool) -> Self {
        Self {
            handlers: HashMap::new(),
            require_auth,
        }
    }

    /// Dispatcher with every method the server ships with.
    pub fn with_builtin_handlers(require_auth: bool) -> Self {
        let mut dispatcher = Self::new(require_auth);
        dispatcher.register(methods::AUTHENTICATE, handlers::Authenticate);
        dispatcher.register(methods::PING, handlers::Ping);
        dispatcher.register(methods::READ_FILE, handlers::ReadFile);
        dispatcher.register(methods::EDIT_FILE, handlers::EditFile);
        dispatcher
    }

    pub fn register(&mut self, method: &'static str, handler: impl RequestHandler + 'static) {
        self.handlers.insert(method, Box::new(handler));
    }

    /// Decode and dispatch one text frame. A decode error means no response
    /// can be produced, since there is no id to correlate it with.
    pub async fn handle_frame(
        &self,
        frame: &str,
        ctx: &mut RequestContext,
    ) -> Result<ServerResponse, DecodeError> {
        let request = ClientRequest::decode(frame)?;
        Ok(self.dispatch(request, ctx).await)
    }

    pub async fn dispatch(&self, request: ClientRequest, ctx: &mut RequestContext) -> ServerResponse {
        let ClientRequest { id, method, params } = request;

        let Some(handler) = self.handlers.get(method.as_str()) else {
            let err = RequestError::unknown_method();
            return ServerResponse::error(id, err.code, err.message);
        };

        if self.require_auth && !ctx.authenticated && !OPEN_METHODS.contains(&method.as_str()) {
            let err = RequestError::unauthorized();
            return ServerResponse::error(id, err.code, err.message);
        }

        match handler.handle(&params, ctx).await {
            Ok(payload) => ServerResponse::result(id, method, payload),
            Err(err) => ServerResponse::error(id, err.code, err.message),
        }
    }
}
