//! Serde support for TTL duration strings.
//!
//! Configuration files write lifetimes the way operators think about them
//! (`10m`, `1h`, `14d`); internally they are [`std::time::Duration`].

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Deserializes a humantime duration string.
///
/// # Errors
///
/// Returns a deserialization error when the string is not a valid duration.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

/// Serializes a duration back to its humantime form.
///
/// # Errors
///
/// Never fails in practice; the signature is dictated by serde.
pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
}

/// Same as the module-level functions, for `Option<Duration>` fields.
pub mod option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Deserializes an optional humantime duration string.
    ///
    /// # Errors
    ///
    /// Returns a deserialization error when the string is present but invalid.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Option<String> = Option::deserialize(deserializer)?;
        value
            .map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }

    /// Serializes an optional duration back to its humantime form.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature is dictated by serde.
    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super")]
        ttl: Duration,
    }

    #[test]
    fn parses_minutes_and_days() {
        let h: Holder = serde_yaml::from_str("ttl: 10m").unwrap();
        assert_eq!(h.ttl, Duration::from_secs(600));

        let h: Holder = serde_yaml::from_str("ttl: 14d").unwrap();
        assert_eq!(h.ttl, Duration::from_secs(14 * 24 * 3600));
    }

    #[test]
    fn round_trips() {
        let h = Holder {
            ttl: Duration::from_secs(3600),
        };
        let yaml = serde_yaml::to_string(&h).unwrap();
        let back: Holder = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.ttl, h.ttl);
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_yaml::from_str::<Holder>("ttl: banana").is_err());
    }
}
