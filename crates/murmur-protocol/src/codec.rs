//! Codec trait and the JSON implementation.
//!
//! A codec turns one frame's bytes into a key-value record and back. The
//! layer above never touches `serde_json` directly; it asks the codec for a
//! record, a classified [`Message`], or a [`ServerFrame`] on the client
//! side.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    classify, DecodeError, Message, ProtocolError, Response, SchemaError, ServerFrame,
};

/// A codec that encodes values to bytes and decodes bytes to records.
///
/// `Send + Sync + 'static` so a single codec value can live in the server
/// for its whole lifetime and be shared with spawned tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into one frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails. The
    /// crate's own `Message` and `Response` always serialize.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Decodes one frame into a key-value record.
    ///
    /// # Errors
    /// [`DecodeError::NotUtf8`], [`DecodeError::NotJson`], or
    /// [`DecodeError::NotObject`], in that order of checking.
    fn decode_object(&self, data: &[u8]) -> Result<Map<String, Value>, DecodeError>;

    /// Decodes one frame and classifies it as a request.
    fn decode_message(&self, data: &[u8]) -> Result<Message, ProtocolError> {
        let obj = self.decode_object(data)?;
        Ok(classify(&obj)?)
    }

    /// Decodes a frame received by a client: either a reply carrying a
    /// `response` code (or the exit echo), or a relayed message.
    fn decode_server_frame(&self, data: &[u8]) -> Result<ServerFrame, ProtocolError> {
        let obj = self.decode_object(data)?;
        let is_exit_echo = obj.len() == 1
            && obj.get("action").and_then(Value::as_str) == Some("exit");
        if obj.contains_key("response") || is_exit_echo {
            let resp: Response = serde_json::from_value(Value::Object(obj))
                .map_err(|e| SchemaError::BadRequest(e.to_string()))?;
            return Ok(ServerFrame::Response(resp));
        }
        Ok(ServerFrame::Message(classify(&obj)?))
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that speaks compact JSON via `serde_json`.
///
/// Compact output never contains a raw newline, so an encoded value is
/// always exactly one line for the transport.
///
/// ## Example
///
/// ```rust
/// use murmur_protocol::{Codec, JsonCodec, Message, User};
///
/// let codec = JsonCodec;
/// let msg = Message::Presence {
///     time: 1_u64.into(),
///     user: User { account_name: "alice".into() },
/// };
/// let bytes = codec.encode(&msg).unwrap();
/// assert_eq!(codec.decode_message(&bytes).unwrap(), msg);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode_object(&self, data: &[u8]) -> Result<Map<String, Value>, DecodeError> {
        let text = std::str::from_utf8(data).map_err(DecodeError::NotUtf8)?;
        match serde_json::from_str(text).map_err(DecodeError::NotJson)? {
            Value::Object(map) => Ok(map),
            Value::Null => Err(DecodeError::NotObject("null")),
            Value::Bool(_) => Err(DecodeError::NotObject("boolean")),
            Value::Number(_) => Err(DecodeError::NotObject("number")),
            Value::String(_) => Err(DecodeError::NotObject("string")),
            Value::Array(_) => Err(DecodeError::NotObject("array")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatMessage;
    use serde_json::json;

    #[test]
    fn test_decode_object_invalid_utf8_is_not_utf8() {
        let err = JsonCodec.decode_object(&[0xff, 0xfe, b'{']).unwrap_err();
        assert!(matches!(err, DecodeError::NotUtf8(_)));
    }

    #[test]
    fn test_decode_object_garbage_is_not_json() {
        let err = JsonCodec.decode_object(b"not json at all").unwrap_err();
        assert!(matches!(err, DecodeError::NotJson(_)));
    }

    #[test]
    fn test_decode_object_string_is_not_object() {
        let err = JsonCodec.decode_object(b"\"not dict\"").unwrap_err();
        assert!(matches!(err, DecodeError::NotObject("string")));
    }

    #[test]
    fn test_decode_object_array_is_not_object() {
        let err = JsonCodec.decode_object(b"[1,2]").unwrap_err();
        assert!(matches!(err, DecodeError::NotObject("array")));
    }

    #[test]
    fn test_decode_message_schema_failure_is_schema_error() {
        let err = JsonCodec
            .decode_message(br#"{"action":"msg","time":1}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Schema(SchemaError::BadRequest(_))
        ));
    }

    #[test]
    fn test_encode_is_single_line() {
        let msg = Message::Chat(ChatMessage {
            time: 1_u64.into(),
            from: "alice".into(),
            to: "bob".into(),
            message: "line one\nline two".into(),
        });
        let bytes = JsonCodec.encode(&msg).unwrap();
        assert!(!bytes.contains(&b'\n'));
    }

    #[test]
    fn test_decode_encode_preserves_fields() {
        // Key order may differ; the field set and values must not.
        let input = br#"{ "message": "hi", "to": "bob", "time": 7, "from": "alice", "action": "msg" }"#;
        let msg = JsonCodec.decode_message(input).unwrap();
        let output = JsonCodec.encode(&msg).unwrap();

        let before: Value = serde_json::from_slice(input).unwrap();
        let after: Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(before.as_object().unwrap().len(), after.as_object().unwrap().len());
        for key in ["action", "time", "from", "to", "message"] {
            assert_eq!(before[key], after[key], "field {key} changed");
        }
    }

    #[test]
    fn test_decode_server_frame_response() {
        let bytes = JsonCodec
            .encode(&Response::Unreachable {
                reason: "offline".into(),
            })
            .unwrap();
        let frame = JsonCodec.decode_server_frame(&bytes).unwrap();
        assert_eq!(
            frame,
            ServerFrame::Response(Response::Unreachable {
                reason: "offline".into()
            })
        );
    }

    #[test]
    fn test_decode_server_frame_exit_ack() {
        let frame = JsonCodec.decode_server_frame(br#"{"action":"exit"}"#).unwrap();
        assert_eq!(frame, ServerFrame::Response(Response::ExitAck));
    }

    #[test]
    fn test_decode_server_frame_relayed_chat() {
        let bytes = serde_json::to_vec(&json!({
            "action": "msg", "time": 1, "from": "alice", "to": "bob", "message": "hey"
        }))
        .unwrap();
        match JsonCodec.decode_server_frame(&bytes).unwrap() {
            ServerFrame::Message(Message::Chat(chat)) => {
                assert_eq!(chat.message, "hey");
                assert_eq!(chat.from.as_str(), "alice");
            }
            other => panic!("expected relayed chat, got {other:?}"),
        }
    }
}
