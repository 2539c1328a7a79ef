use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-request execution options.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Bypass any response cache and go to the network.
    #[serde(default)]
    pub force: bool,
    /// Re-execute the request this long after each completed fetch.
    #[serde(default, with = "serde_millis")]
    pub poll: Option<Duration>,
    /// Caller metadata passed through to the fetch function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl CacheConfig {
    /// Sets `force`.
    #[must_use]
    pub const fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Enables polling every `interval`.
    #[must_use]
    pub const fn with_poll(mut self, interval: Duration) -> Self {
        self.poll = Some(interval);
        self
    }

    /// Enables polling every `millis` milliseconds.
    #[must_use]
    pub const fn with_poll_ms(self, millis: u64) -> Self {
        self.with_poll(Duration::from_millis(millis))
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// `Option<Duration>` as a whole number of milliseconds.
mod serde_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(duration) => {
                let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
                serializer.serialize_some(&millis)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
