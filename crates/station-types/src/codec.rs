//! Schema-registry framing for JSON record bodies.

use crate::error::{RecordParseError, Result};
use crate::schema::RecordSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// First byte of every framed record.
pub const MAGIC_BYTE: u8 = 0;

const HEADER_LEN: usize = 5;

/// Encode an already validated JSON value behind the registry frame header.
pub fn encode_framed(schema_id: u32, value: &Value) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(value)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.push(MAGIC_BYTE);
    bytes.extend_from_slice(&schema_id.to_be_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Split a payload into its schema id (if framed) and JSON body.
///
/// JSON text never starts with a NUL byte, so a leading [`MAGIC_BYTE`] is an
/// unambiguous frame marker.
pub fn split_frame(bytes: &[u8]) -> Result<(Option<u32>, &[u8])> {
    match bytes.first() {
        None => Err(RecordParseError::EmptyPayload),
        Some(&MAGIC_BYTE) => {
            if bytes.len() < HEADER_LEN {
                return Err(RecordParseError::TruncatedFrame(bytes.len()));
            }
            let id = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
            Ok((Some(id), &bytes[HEADER_LEN..]))
        }
        Some(_) => Ok((None, bytes)),
    }
}

/// Decode a framed or plain JSON payload, validating it against `schema` before
/// building the typed value.
pub fn decode_record<T: DeserializeOwned>(bytes: &[u8], schema: &RecordSchema) -> Result<T> {
    let (_, body) = split_frame(bytes)?;
    let value: Value = serde_json::from_slice(body)?;
    schema.validate(&value)?;
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use serde_json::json;

    #[test]
    fn test_frame_header_layout() {
        let bytes = encode_framed(0x0102_0304, &json!(7)).unwrap();
        assert_eq!(&bytes[..5], &[0, 1, 2, 3, 4]);
        assert_eq!(&bytes[5..], b"7");

        let (id, body) = split_frame(&bytes).unwrap();
        assert_eq!(id, Some(0x0102_0304));
        assert_eq!(body, b"7");
    }

    #[test]
    fn test_plain_json_is_not_framed() {
        let (id, body) = split_frame(br#"{"a":1}"#).unwrap();
        assert_eq!(id, None);
        assert_eq!(body, br#"{"a":1}"#);
    }

    #[test]
    fn test_bad_frames() {
        assert!(matches!(
            split_frame(&[]),
            Err(RecordParseError::EmptyPayload)
        ));
        assert!(matches!(
            split_frame(&[0, 0, 1]),
            Err(RecordParseError::TruncatedFrame(3))
        ));
    }

    #[test]
    fn test_decode_checks_schema() {
        let schema = RecordSchema::Primitive(FieldType::Long);
        let n: i64 = decode_record(b"12", &schema).unwrap();
        assert_eq!(n, 12);

        let err = decode_record::<i64>(b"\"12\"", &schema).unwrap_err();
        assert!(matches!(err, RecordParseError::Schema(_)));

        let err = decode_record::<i64>(b"{not json", &schema).unwrap_err();
        assert!(matches!(err, RecordParseError::Json(_)));
    }
}
