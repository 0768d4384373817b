//! Persisted profile document encoding and tolerant per-entry decoding

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::profile::{HitDelayProfile, DEFAULT_DELAY_MILLIS};

/// On-disk document shape
#[derive(Debug, Serialize)]
struct ProfileDocument<'a> {
    saved_at: DateTime<Utc>,
    profiles: Vec<&'a HitDelayProfile>,
}

/// Top-level shape accepted on read. Entries stay untyped so one bad entry
/// cannot fail the whole document.
#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    profiles: Vec<Value>,
}

/// A single entry as written, before defaults are applied
#[derive(Debug, Deserialize)]
struct RawProfileEntry {
    name: Option<String>,
    #[serde(rename = "hitDelay", alias = "delayMillis")]
    hit_delay: Option<i64>,
    enabled: Option<bool>,
}

/// Why a document entry was skipped
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("entry has no name")]
    MissingName,

    #[error("entry name is blank")]
    BlankName,

    #[error("profile {name} has negative delay {delay}")]
    NegativeDelay { name: String, delay: i64 },

    #[error("malformed entry: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Result of decoding a document
#[derive(Debug, Default)]
pub struct DecodedDocument {
    /// Entries that decoded, in document order
    pub profiles: Vec<HitDelayProfile>,
    /// Index and reason for each skipped entry
    pub rejected: Vec<(usize, DecodeError)>,
}

/// Encode profiles into the persisted document, sorted by name
pub fn encode<'a, I>(profiles: I) -> Result<String, serde_json::Error>
where
    I: IntoIterator<Item = &'a HitDelayProfile>,
{
    let mut profiles: Vec<&HitDelayProfile> = profiles.into_iter().collect();
    profiles.sort_by(|a, b| a.name().cmp(b.name()));

    serde_json::to_string_pretty(&ProfileDocument {
        saved_at: Utc::now(),
        profiles,
    })
}

/// Decode a document. Only a document that is not JSON, or whose
/// `profiles` field is not a list, fails as a whole.
pub fn decode(text: &str) -> Result<DecodedDocument, serde_json::Error> {
    let raw: RawDocument = serde_json::from_str(text)?;
    let mut decoded = DecodedDocument::default();

    for (index, entry) in raw.profiles.into_iter().enumerate() {
        match decode_entry(entry) {
            Ok(profile) => decoded.profiles.push(profile),
            Err(err) => decoded.rejected.push((index, err)),
        }
    }

    Ok(decoded)
}

fn decode_entry(entry: Value) -> Result<HitDelayProfile, DecodeError> {
    let raw: RawProfileEntry = serde_json::from_value(entry)?;
    apply_defaults(raw)
}

/// Defaults: delay 500ms, enabled true
fn apply_defaults(raw: RawProfileEntry) -> Result<HitDelayProfile, DecodeError> {
    let name = raw.name.ok_or(DecodeError::MissingName)?;
    if name.trim().is_empty() {
        return Err(DecodeError::BlankName);
    }

    let delay_millis = match raw.hit_delay {
        None => DEFAULT_DELAY_MILLIS,
        Some(delay) if delay < 0 => return Err(DecodeError::NegativeDelay { name, delay }),
        Some(delay) => delay as u64,
    };

    HitDelayProfile::new(name, delay_millis, raw.enabled.unwrap_or(true))
        .map_err(|_| DecodeError::BlankName)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let decoded = decode(r#"{ "profiles": [ { "name": "bare" } ] }"#).unwrap();

        assert!(decoded.rejected.is_empty());
        let profile = &decoded.profiles[0];
        assert_eq!(profile.name(), "bare");
        assert_eq!(profile.delay_millis, 500);
        assert!(profile.enabled);
    }

    #[test]
    fn accepts_delay_millis_alias() {
        let decoded =
            decode(r#"{ "profiles": [ { "name": "alias", "delayMillis": 75, "enabled": false } ] }"#)
                .unwrap();

        assert_eq!(decoded.profiles[0].delay_millis, 75);
        assert!(!decoded.profiles[0].enabled);
    }

    #[test]
    fn malformed_entries_are_skipped_individually() {
        let text = r#"{
            "profiles": [
                { "name": "good", "hitDelay": 100 },
                { "hitDelay": 100 },
                { "name": "  ", "hitDelay": 100 },
                { "name": "neg", "hitDelay": -5 },
                { "name": "text", "hitDelay": "fast" },
                { "name": "flag", "enabled": "yes" },
                42,
                { "name": "also-good", "hitDelay": 0, "enabled": true }
            ]
        }"#;

        let decoded = decode(text).unwrap();
        let names: Vec<&str> = decoded.profiles.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["good", "also-good"]);

        let rejected: Vec<usize> = decoded.rejected.iter().map(|(i, _)| *i).collect();
        assert_eq!(rejected, vec![1, 2, 3, 4, 5, 6]);
        assert!(matches!(decoded.rejected[0].1, DecodeError::MissingName));
        assert!(matches!(decoded.rejected[1].1, DecodeError::BlankName));
        assert!(matches!(
            decoded.rejected[2].1,
            DecodeError::NegativeDelay { delay: -5, .. }
        ));
        assert!(matches!(decoded.rejected[3].1, DecodeError::Malformed(_)));
    }

    #[test]
    fn document_without_profiles_list_is_empty() {
        let decoded = decode("{}").unwrap();
        assert!(decoded.profiles.is_empty());
        assert!(decoded.rejected.is_empty());
    }

    #[test]
    fn non_json_document_fails_as_a_whole() {
        assert!(decode("profiles:\n  default: 500").is_err());
        assert!(decode(r#"{ "profiles": { "default": 500 } }"#).is_err());
    }

    #[test]
    fn encoded_document_reads_back() {
        let profiles = vec![
            HitDelayProfile::new("slow", 1000, true).unwrap(),
            HitDelayProfile::new("combo", 0, false).unwrap(),
        ];

        let text = encode(&profiles).unwrap();
        assert!(text.contains("\"saved_at\""));

        let decoded = decode(&text).unwrap();
        let names: Vec<&str> = decoded.profiles.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["combo", "slow"]);
        assert_eq!(decoded.profiles[0], profiles[1]);
    }
}
