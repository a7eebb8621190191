//! The game server is inconsistent about ids: the same asset id shows up as
//! `"9001"` in one payload and `9001` in the next. These helpers accept both.

use serde::de::Error;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum IdInput {
    String(String),
    Number(i64),
}

/// Deserialize a string-or-number id into its string form.
pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match IdInput::deserialize(deserializer)? {
        IdInput::String(raw) => Ok(raw),
        IdInput::Number(value) => Ok(value.to_string()),
    }
}

/// Deserialize a string-or-number id into a `u64`.
pub fn number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match IdInput::deserialize(deserializer)? {
        IdInput::String(raw) => raw.trim().parse::<u64>().map_err(D::Error::custom),
        IdInput::Number(value) => u64::try_from(value).map_err(D::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Wrapper {
        #[serde(deserialize_with = "super::string")]
        asset_id: String,
        #[serde(deserialize_with = "super::number")]
        account_id: u64,
    }

    #[test]
    fn accepts_strings() {
        let parsed: Wrapper =
            serde_json::from_str(r#"{"asset_id":"9001","account_id":"12345"}"#).expect("strings");
        assert_eq!(parsed.asset_id, "9001");
        assert_eq!(parsed.account_id, 12345);
    }

    #[test]
    fn accepts_numbers() {
        let parsed: Wrapper =
            serde_json::from_str(r#"{"asset_id":9001,"account_id":12345}"#).expect("numbers");
        assert_eq!(parsed.asset_id, "9001");
        assert_eq!(parsed.account_id, 12345);
    }

    #[test]
    fn rejects_negative_account() {
        let parsed: Result<Wrapper, _> =
            serde_json::from_str(r#"{"asset_id":1,"account_id":-4}"#);
        assert!(parsed.is_err());
    }
}
