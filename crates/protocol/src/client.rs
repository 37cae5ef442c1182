//! Client → Server requests

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Envelope key wrapping every inbound request.
pub const CLIENT_REQUEST: &str = "clientRequest";

/// A decoded `clientRequest` frame.
///
/// The wire shape is `{"clientRequest": {"id": <any>, "<method>": <params>}}`:
/// the method is the one key next to `id`, and its value is the parameter
/// object. The id is opaque and echoed back untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientRequest {
    pub id: Value,
    pub method: String,
    pub params: Value,
}

/// Why an inbound frame could not be turned into a request.
///
/// None of these carry a usable id, so no response can be correlated.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is not a clientRequest envelope")]
    MissingEnvelope,
    #[error("clientRequest has no id")]
    MissingId,
    #[error("clientRequest names no method")]
    MissingMethod,
    #[error("clientRequest names more than one method: {0:?}")]
    AmbiguousMethod(Vec<String>),
}

impl ClientRequest {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Value) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Decode one text frame.
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(frame)?;
        let Value::Object(mut envelope) = value else {
            return Err(DecodeError::MissingEnvelope);
        };
        let Some(Value::Object(mut body)) = envelope.remove(CLIENT_REQUEST) else {
            return Err(DecodeError::MissingEnvelope);
        };

        let id = body.remove("id").ok_or(DecodeError::MissingId)?;

        if body.len() > 1 {
            return Err(DecodeError::AmbiguousMethod(body.keys().cloned().collect()));
        }
        let (method, params) = body.into_iter().next().ok_or(DecodeError::MissingMethod)?;

        Ok(Self { id, method, params })
    }

    /// Encode as a `clientRequest` frame.
    pub fn encode(&self) -> String {
        let mut body = Map::new();
        body.insert("id".to_string(), self.id.clone());
        body.insert(self.method.clone(), self.params.clone());

        let mut envelope = Map::new();
        envelope.insert(CLIENT_REQUEST.to_string(), Value::Object(body));
        Value::Object(envelope).to_string()
    }

    /// Deserialize the parameter object into a typed struct.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::{ClientRequest, DecodeError};
    use crate::types::AuthenticateParams;
    use serde_json::json;

    #[test]
    fn decodes_authenticate_request() {
        let frame = r#"{"clientRequest":{"id":"req-1","authenticate":{"authToken":"abc"}}}"#;
        let request = ClientRequest::decode(frame).expect("decode authenticate");

        assert_eq!(request.id, json!("req-1"));
        assert_eq!(request.method, "authenticate");
        let params: AuthenticateParams = request.params().expect("typed params");
        assert_eq!(params.auth_token, "abc");
    }

    #[test]
    fn keeps_numeric_and_null_ids_opaque() {
        let numeric = ClientRequest::decode(r#"{"clientRequest":{"id":7,"ping":{"message":"x"}}}"#)
            .expect("numeric id");
        assert_eq!(numeric.id, json!(7));

        let null = ClientRequest::decode(r#"{"clientRequest":{"id":null,"ping":{}}}"#)
            .expect("null id is still an id");
        assert_eq!(null.id, json!(null));
    }

    #[test]
    fn unknown_methods_still_decode() {
        let request = ClientRequest::decode(r#"{"clientRequest":{"id":1,"foo":{}}}"#)
            .expect("routing decides what is unknown");
        assert_eq!(request.method, "foo");
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(
            ClientRequest::decode("not json"),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            ClientRequest::decode(r#"{"ping":{"message":"x"}}"#),
            Err(DecodeError::MissingEnvelope)
        ));
        assert!(matches!(
            ClientRequest::decode(r#"{"clientRequest":[1,2]}"#),
            Err(DecodeError::MissingEnvelope)
        ));
        assert!(matches!(
            ClientRequest::decode(r#"{"clientRequest":{"ping":{"message":"x"}}}"#),
            Err(DecodeError::MissingId)
        ));
        assert!(matches!(
            ClientRequest::decode(r#"{"clientRequest":{"id":1}}"#),
            Err(DecodeError::MissingMethod)
        ));
        assert!(matches!(
            ClientRequest::decode(r#"{"clientRequest":{"id":1,"ping":{},"foo":{}}}"#),
            Err(DecodeError::AmbiguousMethod(_))
        ));
    }

    #[test]
    fn encode_produces_decodable_frame() {
        let request = ClientRequest::new("abc", "ping", json!({"message": "hello"}));
        let decoded = ClientRequest::decode(&request.encode()).expect("decode encoded frame");
        assert_eq!(decoded, request);
    }
}
