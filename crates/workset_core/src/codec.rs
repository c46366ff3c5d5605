//! CBOR encoding of entity state images.
//!
//! Stores persist each object as an opaque binary payload. Entities encode
//! themselves through [`serde`] and this module fixes the wire format to
//! CBOR so every store sees the same bytes for the same state.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PersistenceError, PersistenceResult};

/// Encodes a serializable value into a CBOR byte vector.
pub fn encode<T: Serialize>(value: &T) -> PersistenceResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| PersistenceError::codec(format!("encode: {e}")))?;
    Ok(buf)
}

/// Decodes a value from a CBOR byte slice.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> PersistenceResult<T> {
    ciborium::from_reader(bytes).map_err(|e| PersistenceError::codec(format!("decode: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn round_trips_a_struct() {
        let sample = Sample {
            name: "Berlin".into(),
            count: 7,
        };
        let bytes = encode(&sample).unwrap();
        let back: Sample = decode(&bytes).unwrap();
        assert_eq!(back, sample);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode::<Sample>(&[0xff, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, PersistenceError::Codec { .. }));
    }
}
