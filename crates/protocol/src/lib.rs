//! agentlink protocol
//!
//! Wire types exchanged between an editor session and an attached agent.
//! Frames are JSON text over a WebSocket; every frame is a single-key
//! envelope (`clientRequest`, `serverResponse`, `serverNotification`).

pub mod client;
pub mod server;
pub mod types;

pub use client::{ClientRequest, DecodeError};
pub use server::{ResponseBody, ResponseError, ServerMessage, ServerNotification, ServerResponse};
pub use types::*;

/// Method names understood by the server.
pub mod methods {
    pub const AUTHENTICATE: &str = "authenticate";
    pub const PING: &str = "ping";
    pub const READ_FILE: &str = "readFile";
    pub const EDIT_FILE: &str = "editFile";
}

/// Error codes carried in `serverResponse.error.code`.
pub mod error_codes {
    pub const BAD_REQUEST: i32 = 400;
    pub const UNAUTHORIZED: i32 = 401;
    pub const FORBIDDEN: i32 = 403;
    pub const NOT_FOUND: i32 = 404;
    pub const CONFLICT: i32 = 409;
    pub const INTERNAL: i32 = 500;
}
