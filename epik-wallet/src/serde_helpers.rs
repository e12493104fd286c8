//! Serde adapters for the node's JSON conventions

/// Byte strings as standard base64; `null` decodes to an empty vector
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

/// Big integers as decimal strings
pub mod decimal_u256 {
    use ethers_core::types::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(s.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use ethers_core::types::U256;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "super::base64_bytes")]
        data: Vec<u8>,
        #[serde(with = "super::decimal_u256")]
        value: U256,
    }

    #[test]
    fn test_node_json_conventions() {
        let sample = Sample { data: vec![1, 2, 3], value: U256::from(1_000_000u64) };
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(json, r#"{"data":"AQID","value":"1000000"}"#);
        assert_eq!(serde_json::from_str::<Sample>(&json).unwrap(), sample);
    }

    #[test]
    fn test_null_bytes_and_bad_numbers() {
        let sample: Sample = serde_json::from_str(r#"{"data":null,"value":"0"}"#).unwrap();
        assert!(sample.data.is_empty());
        assert!(serde_json::from_str::<Sample>(r#"{"data":"","value":"-1"}"#).is_err());
    }
}
