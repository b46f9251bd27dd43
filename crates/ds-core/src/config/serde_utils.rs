//! Serde helpers for configuration values

/// Serialize `std::time::Duration` as whole seconds.
///
/// ```ignore
/// #[serde(with = "ds_core::config::serde_utils::duration_secs")]
/// timeout: Duration,
/// ```
pub mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Timeouts {
        #[serde(with = "duration_secs")]
        launch: Duration,
    }

    #[test]
    fn test_duration_secs_toml() {
        let parsed: Timeouts = toml::from_str("launch = 600").unwrap();
        assert_eq!(parsed.launch, Duration::from_secs(600));

        let rendered = toml::to_string(&parsed).unwrap();
        assert_eq!(rendered.trim(), "launch = 600");
    }
}
