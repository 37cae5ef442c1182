//! Server → Client messages

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::types::Selection;

/// Frames sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerMessage {
    ServerResponse(ServerResponse),
    ServerNotification(ServerNotification),
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }
}

impl From<ServerResponse> for ServerMessage {
    fn from(response: ServerResponse) -> Self {
        Self::ServerResponse(response)
    }
}

impl From<ServerNotification> for ServerMessage {
    fn from(notification: ServerNotification) -> Self {
        Self::ServerNotification(notification)
    }
}

/// Structured error carried instead of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i32,
    pub message: String,
}

/// Either the result of a method, keyed by the method name, or an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Result { method: String, payload: Value },
    Error(ResponseError),
}

/// Reply to exactly one `clientRequest`, correlated by `id`.
///
/// Wire shape: `{"id": <id>, "<method>": {...}}` or
/// `{"id": <id>, "error": {"code": .., "message": ..}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerResponse {
    pub id: Value,
    pub body: ResponseBody,
}

impl ServerResponse {
    pub fn result(id: Value, method: impl Into<String>, payload: Value) -> Self {
        Self {
            id,
            body: ResponseBody::Result {
                method: method.into(),
                payload,
            },
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            body: ResponseBody::Error(ResponseError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.body, ResponseBody::Error(_))
    }
}

impl Serialize for ServerResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("id", &self.id)?;
        match &self.body {
            ResponseBody::Result { method, payload } => map.serialize_entry(method, payload)?,
            ResponseBody::Error(error) => map.serialize_entry("error", error)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ServerResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let id = fields
            .remove("id")
            .ok_or_else(|| D::Error::missing_field("id"))?;

        if let Some(error) = fields.remove("error") {
            if !fields.is_empty() {
                return Err(D::Error::custom("serverResponse has both error and result"));
            }
            let error = ResponseError::deserialize(error).map_err(D::Error::custom)?;
            return Ok(Self {
                id,
                body: ResponseBody::Error(error),
            });
        }

        if fields.len() != 1 {
            return Err(D::Error::custom(
                "serverResponse must carry exactly one result",
            ));
        }
        let (method, payload) = fields
            .into_iter()
            .next()
            .ok_or_else(|| D::Error::custom("serverResponse carries no result"))?;
        Ok(Self {
            id,
            body: ResponseBody::Result { method, payload },
        })
    }
}

/// Uncorrelated, best-effort events pushed to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerNotification {
    PluginMetadata {
        version: String,
    },
    VisibleFilesDidChange {
        uris: Vec<String>,
    },
    SelectionDidChange {
        uri: String,
        selections: Vec<Selection>,
    },
}

impl ServerNotification {
    /// Event name as it appears on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::PluginMetadata { .. } => "pluginMetadata",
            Self::VisibleFilesDidChange { .. } => "visibleFilesDidChange",
            Self::SelectionDidChange { .. } => "selectionDidChange",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Position, Range};
    use serde_json::json;

    #[test]
    fn result_response_is_keyed_by_method() {
        let response = ServerResponse::result(json!("r1"), "ping", json!({"message": "hi"}));
        let value = serde_json::to_value(ServerMessage::from(response)).unwrap();
        assert_eq!(
            value,
            json!({"serverResponse": {"id": "r1", "ping": {"message": "hi"}}})
        );
    }

    #[test]
    fn error_response_has_no_result_key() {
        let response = ServerResponse::error(json!(3), 400, "Unknown request method");
        let value = serde_json::to_value(ServerMessage::from(response)).unwrap();
        assert_eq!(
            value,
            json!({"serverResponse": {"id": 3, "error": {"code": 400, "message": "Unknown request method"}}})
        );
    }

    #[test]
    fn response_roundtrips_through_text() {
        let original: ServerMessage =
            ServerResponse::result(json!({"nested": true}), "authenticate", json!({"authenticated": true}))
                .into();
        let decoded = ServerMessage::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded, original);

        let original: ServerMessage = ServerResponse::error(json!(null), 404, "missing").into();
        let decoded = ServerMessage::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn response_with_error_and_result_is_rejected() {
        let frame = r#"{"serverResponse":{"id":1,"ping":{},"error":{"code":400,"message":"x"}}}"#;
        assert!(ServerMessage::decode(frame).is_err());
    }

    #[test]
    fn selection_notification_wire_shape() {
        let notification = ServerNotification::SelectionDidChange {
            uri: "file:///tmp/project/src/main.rs".to_string(),
            selections: vec![Selection {
                range: Range {
                    start: Position { line: 2, character: 4 },
                    end: Position { line: 2, character: 9 },
                },
                text: "hello".to_string(),
                is_empty: false,
            }],
        };
        let value = serde_json::to_value(ServerMessage::from(notification.clone())).unwrap();
        assert_eq!(
            value,
            json!({"serverNotification": {"selectionDidChange": {
                "uri": "file:///tmp/project/src/main.rs",
                "selections": [{
                    "range": {"start": {"line": 2, "character": 4}, "end": {"line": 2, "character": 9}},
                    "text": "hello",
                    "isEmpty": false
                }]
            }}})
        );

        let decoded = ServerMessage::decode(&value.to_string()).unwrap();
        assert_eq!(decoded, ServerMessage::ServerNotification(notification));
    }

    #[test]
    fn event_names_match_serialized_keys() {
        let notifications = [
            ServerNotification::PluginMetadata {
                version: "1.0.0".into(),
            },
            ServerNotification::VisibleFilesDidChange { uris: vec![] },
        ];
        for notification in notifications {
            let value = serde_json::to_value(&notification).unwrap();
            assert!(value.get(notification.event_name()).is_some());
        }
    }
}
