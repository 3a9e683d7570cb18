pub mod client;
pub mod messages;

use std::fmt;

/// Read buffer size for one wire message; shared by the RPC client and the
/// worker-side dispatch server so both sides agree on the maximum round-trip
/// payload.
pub const READ_BUFFER_SIZE_BYTES: usize = 4096;

/// Raw-text reply a worker sends for requests it rejects before (or instead
/// of) JSON parsing. Compared verbatim by the client ahead of any decode.
pub const INVALID_REQUEST_REPLY: &str = "INVALID REQUEST";

#[derive(Debug, PartialEq, Eq)]
pub enum TextCodecError {
    NonAsciiByte { position: usize },
}

impl fmt::Display for TextCodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonAsciiByte { position } => {
                write!(f, "wire text contains non-ASCII byte at position {position}")
            }
        }
    }
}

impl std::error::Error for TextCodecError {}

/// Encodes a JSON document as single-byte-per-character wire text. Non-ASCII
/// characters can only occur inside JSON string literals, where `\uXXXX`
/// escapes are an equivalent spelling, so the output parses back to the same
/// document.
pub fn to_ascii_bytes(json_text: &str) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(json_text.len());
    for ch in json_text.chars() {
        if ch.is_ascii() {
            encoded.push(ch as u8);
        } else {
            let mut units = [0_u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                encoded.extend_from_slice(format!("\\u{unit:04x}").as_bytes());
            }
        }
    }
    encoded
}

pub fn from_ascii_bytes(bytes: &[u8]) -> Result<&str, TextCodecError> {
    if let Some(position) = bytes.iter().position(|byte| !byte.is_ascii()) {
        return Err(TextCodecError::NonAsciiByte { position });
    }

    Ok(std::str::from_utf8(bytes).expect("all-ASCII bytes are valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::{
        from_ascii_bytes, to_ascii_bytes, TextCodecError, INVALID_REQUEST_REPLY,
        READ_BUFFER_SIZE_BYTES,
    };

    #[test]
    fn ascii_json_passes_through_unchanged() {
        let text = r#"{"request":"Status"}"#;
        let encoded = to_ascii_bytes(text);
        assert_eq!(encoded, text.as_bytes());
        assert_eq!(from_ascii_bytes(&encoded).expect("should decode"), text);
    }

    #[test]
    fn non_ascii_string_content_is_escaped_and_equivalent() {
        let document = serde_json::json!({"label": "żółw"});
        let text = serde_json::to_string(&document).expect("document should serialize");

        let encoded = to_ascii_bytes(&text);
        assert!(encoded.iter().all(u8::is_ascii));

        let decoded_text = from_ascii_bytes(&encoded).expect("should decode");
        let reparsed: serde_json::Value =
            serde_json::from_str(decoded_text).expect("escaped JSON should parse");
        assert_eq!(reparsed, document);
    }

    #[test]
    fn astral_plane_characters_use_surrogate_pairs() {
        let document = serde_json::json!({"emoji": "🔥"});
        let text = serde_json::to_string(&document).expect("document should serialize");

        let encoded = to_ascii_bytes(&text);
        let decoded_text = from_ascii_bytes(&encoded).expect("should decode");
        let reparsed: serde_json::Value =
            serde_json::from_str(decoded_text).expect("escaped JSON should parse");
        assert_eq!(reparsed, document);
    }

    #[test]
    fn rejects_non_ascii_bytes_on_decode() {
        let bytes = [b'{', 0xc3, 0xb3, b'}'];
        let err = from_ascii_bytes(&bytes).expect_err("non-ASCII byte should fail");
        assert_eq!(err, TextCodecError::NonAsciiByte { position: 1 });
    }

    #[test]
    fn shared_constants_fit_the_wire_contract() {
        assert!(INVALID_REQUEST_REPLY.is_ascii());
        assert!(INVALID_REQUEST_REPLY.len() < READ_BUFFER_SIZE_BYTES);
    }
}
