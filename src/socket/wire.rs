use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Inbound message shape shared by every channel the backend pushes on.
/// Unknown `type` values are expected; handlers ignore what they do not
/// recognize.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: Option<String>,
    pub data: Option<simd_json::OwnedValue>,
}

pub fn parse_envelope(payload: &mut [u8]) -> Result<Envelope, Error> {
    let envelope: Envelope = simd_json::serde::from_slice(payload)?;
    Ok(envelope)
}

#[derive(Debug, Serialize)]
struct AuthFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    token: &'a str,
}

/// Sent once per successful connect, before any other traffic.
pub fn auth_frame(token: &str) -> Result<String, Error> {
    let frame = simd_json::serde::to_string(&AuthFrame {
        kind: "auth",
        token,
    })?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_envelope_with_data() {
        let mut payload =
            br#"{"type":"crypto.price.update","data":{"symbol":"BTCUSDT","price":50000.0}}"#
                .to_vec();
        let envelope = parse_envelope(&mut payload).expect("envelope should parse");

        assert_eq!(envelope.kind, "crypto.price.update");
        assert!(envelope.message.is_none());
        assert!(envelope.data.is_some());
    }

    #[test]
    fn parses_envelope_without_data() {
        let mut payload = br#"{"type":"pong","message":"ok"}"#.to_vec();
        let envelope = parse_envelope(&mut payload).expect("envelope should parse");

        assert_eq!(envelope.kind, "pong");
        assert_eq!(envelope.message.as_deref(), Some("ok"));
        assert!(envelope.data.is_none());
    }

    #[test]
    fn rejects_malformed_payload() {
        let mut payload = br#"{"type":"#.to_vec();
        assert!(parse_envelope(&mut payload).is_err());
    }

    #[test]
    fn auth_frame_carries_token() {
        let frame = auth_frame("secret").expect("auth frame should serialize");
        assert!(frame.contains(r#""type":"auth""#));
        assert!(frame.contains(r#""token":"secret""#));
    }
}
