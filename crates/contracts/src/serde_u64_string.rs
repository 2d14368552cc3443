//! Serialize 64-bit player/entity ids as strings.
//!
//! Player ids occupy the full u64 range, which silently loses precision as a
//! JSON number in JavaScript consumers; on the wire they travel as strings.
//! Deserialization accepts either form.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum U64Input {
        String(String),
        Number(u64),
    }

    match U64Input::deserialize(deserializer)? {
        U64Input::String(raw) => raw.parse::<u64>().map_err(D::Error::custom),
        U64Input::Number(value) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Wrapper {
        #[serde(with = "super")]
        player_id: u64,
    }

    #[test]
    fn serializes_as_string() {
        let raw = serde_json::to_string(&Wrapper {
            player_id: 76561198000000001,
        })
        .expect("serializes");
        assert_eq!(raw, r#"{"player_id":"76561198000000001"}"#);
    }

    #[test]
    fn deserialize_accepts_string() {
        let parsed: Wrapper =
            serde_json::from_str(r#"{"player_id":"76561198000000001"}"#).expect("string id");
        assert_eq!(parsed.player_id, 76561198000000001);
    }

    #[test]
    fn deserialize_accepts_number() {
        let parsed: Wrapper = serde_json::from_str(r#"{"player_id":1001}"#).expect("numeric id");
        assert_eq!(parsed.player_id, 1001);
    }
}
