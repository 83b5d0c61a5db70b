//! The contract cached values must satisfy.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Capability a cached value must expose: a stable schema-version tag and a
/// canonical text encoding.
///
/// A cache instance is bound to exactly one implementing type. The canonical
/// encoding is the JSON rendering of the record's fields; every `size` the
/// cache accounts for is the byte length of that encoding. Stored entries
/// whose schema-version tag differs from the current [`schema_version`] are
/// discarded when they are next accessed.
///
/// [`schema_version`]: Cacheable::schema_version
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use strata::Cacheable;
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct UserProfile {
///     name: String,
///     visits: u32,
/// }
///
/// impl Cacheable for UserProfile {
///     fn schema_version() -> &'static str {
///         "1.0.0"
///     }
/// }
/// ```
pub trait Cacheable: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Structural version tag for the record type.
    fn schema_version() -> &'static str;

    /// Canonical encoding used for on-disk storage and size accounting.
    fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a record from its canonical encoding.
    fn decode(encoded: &str) -> Result<Self> {
        Ok(serde_json::from_str(encoded)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    impl Cacheable for Sample {
        fn schema_version() -> &'static str {
            "1.0.0"
        }
    }

    #[test]
    fn test_round_trip() {
        let sample = Sample {
            name: "widget".to_string(),
            count: 7,
        };

        let encoded = sample.encode().unwrap();
        let decoded = Sample::decode(&encoded).unwrap();
        assert_eq!(decoded, sample);
    }

    #[test]
    fn test_size_is_encoded_length() {
        let sample = Sample {
            name: "日本語".to_string(),
            count: 1,
        };

        let encoded = sample.encode().unwrap();
        // Size accounting everywhere in the cache uses byte length, not
        // character count.
        assert_eq!(encoded.len(), encoded.as_bytes().len());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(Sample::decode("not json").is_err());
        assert!(Sample::decode(r#"{"name": 3}"#).is_err());
    }
}
