//! Snapshot envelope: `{ "state": { "<key>": <value> } }`

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{StorageError, StorageResult};

/// Encode a collection value under its key
pub fn encode_snapshot<T: Serialize + ?Sized>(key: &str, value: &T) -> StorageResult<Vec<u8>> {
    let mut state = serde_json::Map::new();
    state.insert(key.to_string(), serde_json::to_value(value)?);
    let envelope = serde_json::json!({ "state": state });
    Ok(serde_json::to_vec(&envelope)?)
}

/// Decode a snapshot written by [`encode_snapshot`]
///
/// A snapshot without the key decodes to `T::default()`.
pub fn decode_snapshot<T: DeserializeOwned + Default>(key: &str, bytes: &[u8]) -> StorageResult<T> {
    let mut envelope: serde_json::Value = serde_json::from_slice(bytes)?;
    let value = envelope
        .get_mut("state")
        .ok_or_else(|| StorageError::Malformed(key.to_string(), "missing 'state'".into()))?
        .get_mut(key)
        .map(serde_json::Value::take);

    match value {
        Some(v) => Ok(serde_json::from_value(v)?),
        None => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let bytes = encode_snapshot("orders", &vec![1, 2, 3]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, serde_json::json!({ "state": { "orders": [1, 2, 3] } }));
    }

    #[test]
    fn test_decode_round_trip() {
        let bytes = encode_snapshot("tables", &vec!["a".to_string()]).unwrap();
        let decoded: Vec<String> = decode_snapshot("tables", &bytes).unwrap();
        assert_eq!(decoded, vec!["a".to_string()]);
    }

    #[test]
    fn test_decode_missing_key_defaults() {
        let decoded: Vec<u32> = decode_snapshot("orders", br#"{"state":{}}"#).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_decode_without_state_is_malformed() {
        let err = decode_snapshot::<Vec<u32>>("orders", br#"{"orders":[]}"#).unwrap_err();
        assert!(matches!(err, StorageError::Malformed(_, _)));
    }
}
