//! Firestore typed-value JSON.
//!
//! Firestore's REST API wraps every field in a single-key object naming its
//! type, e.g. `{"stringValue": "Mug"}` or `{"integerValue": "3"}` (64-bit
//! integers travel as strings).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use pocket_store_core::DocumentId;

use crate::backend::{BackendError, Document, FieldValue, Fields};

/// A document as returned by the REST API.
#[derive(Debug, Deserialize)]
pub struct RawDocument {
    /// Full resource name ending in `/{collection}/{id}`.
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// Encode a value. Returns `None` for server timestamps, which are sent as
/// field transforms instead.
pub fn encode_value(value: &FieldValue) -> Option<Value> {
    let encoded = match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Bool(b) => json!({ "booleanValue": b }),
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(d) => json!({ "doubleValue": d }),
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(ts) => {
            json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::Micros, true) })
        }
        FieldValue::ServerTimestamp => return None,
    };
    Some(encoded)
}

/// Encode a field map, splitting out the names of server-timestamp fields.
pub fn encode_fields(fields: &Fields) -> (Map<String, Value>, Vec<String>) {
    let mut encoded = Map::new();
    let mut server_timestamps = Vec::new();

    for (name, value) in fields {
        match encode_value(value) {
            Some(v) => {
                encoded.insert(name.clone(), v);
            }
            None => server_timestamps.push(name.clone()),
        }
    }

    (encoded, server_timestamps)
}

/// Decode a typed value.
///
/// Types the storefront never writes (maps, arrays, references, bytes,
/// geo points) read as null.
///
/// # Errors
///
/// Returns `BackendError::Parse` if the value is not a typed-value object or
/// its payload does not match its type.
pub fn decode_value(value: &Value) -> Result<FieldValue, BackendError> {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Err(BackendError::Parse(format!("not a typed value: {value}")));
    };

    let decoded = match kind.as_str() {
        "nullValue" => Some(FieldValue::Null),
        "booleanValue" => inner.as_bool().map(FieldValue::Bool),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| inner.as_i64())
            .map(FieldValue::Integer),
        "doubleValue" => inner.as_f64().map(FieldValue::Double),
        "stringValue" => inner.as_str().map(|s| FieldValue::String(s.to_owned())),
        "timestampValue" => inner
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| FieldValue::Timestamp(ts.with_timezone(&Utc))),
        other => {
            tracing::debug!(kind = other, "Unsupported Firestore value type, reading as null");
            Some(FieldValue::Null)
        }
    };

    decoded.ok_or_else(|| BackendError::Parse(format!("malformed {kind}: {inner}")))
}

/// Decode a document, taking its ID from the last segment of its name.
///
/// # Errors
///
/// Returns `BackendError::Parse` if any field fails to decode.
pub fn decode_document(raw: RawDocument) -> Result<Document, BackendError> {
    let id = raw
        .name
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| BackendError::Parse(format!("bad document name: {}", raw.name)))?;

    let fields = raw
        .fields
        .iter()
        .map(|(name, value)| Ok((name.clone(), decode_value(value)?)))
        .collect::<Result<Fields, BackendError>>()?;

    Ok(Document {
        id: DocumentId::new(id),
        fields,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_integers_are_strings_on_the_wire() {
        assert_eq!(
            encode_value(&FieldValue::Integer(3)).unwrap(),
            json!({ "integerValue": "3" })
        );
        assert_eq!(
            decode_value(&json!({ "integerValue": "42" })).unwrap(),
            FieldValue::Integer(42)
        );
    }

    #[test]
    fn test_timestamp_encoding() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let encoded = encode_value(&FieldValue::Timestamp(ts)).unwrap();
        assert_eq!(
            encoded,
            json!({ "timestampValue": "2024-05-01T12:30:00.000000Z" })
        );
        assert_eq!(
            decode_value(&json!({ "timestampValue": "2024-05-01T12:30:00.123456789Z" }))
                .unwrap()
                .as_timestamp()
                .map(|t| t.timestamp()),
            Some(ts.timestamp())
        );
    }

    #[test]
    fn test_server_timestamps_split_out() {
        let fields = Fields::from([
            ("name".to_string(), FieldValue::from("Mug")),
            ("createdAt".to_string(), FieldValue::ServerTimestamp),
        ]);
        let (encoded, transforms) = encode_fields(&fields);

        assert_eq!(encoded.len(), 1);
        assert_eq!(encoded["name"], json!({ "stringValue": "Mug" }));
        assert_eq!(transforms, vec!["createdAt".to_string()]);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode_value(&json!("bare")).is_err());
        assert!(decode_value(&json!({ "integerValue": "x" })).is_err());
        assert!(decode_value(&json!({ "booleanValue": "yes" })).is_err());
    }

    #[test]
    fn test_unsupported_types_read_as_null() {
        assert_eq!(
            decode_value(&json!({ "arrayValue": { "values": [] } })).unwrap(),
            FieldValue::Null
        );
    }

    #[test]
    fn test_decode_document() {
        let raw: RawDocument = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/products/abc123",
            "fields": {
                "productName": { "stringValue": "Mug" },
                "price": { "doubleValue": 12.5 }
            },
            "createTime": "2024-05-01T12:30:00Z"
        }))
        .unwrap();

        let doc = decode_document(raw).unwrap();
        assert_eq!(doc.id.as_str(), "abc123");
        assert_eq!(doc.string("productName"), Some("Mug"));
        assert_eq!(doc.get("price"), Some(&FieldValue::Double(12.5)));
    }
}
