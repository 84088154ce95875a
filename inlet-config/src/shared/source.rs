use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON is the only content type the engine can currently parse.
const JSON_CONTENT_TYPE: &str = "application/json";

const fn default_max_workers() -> u16 {
    1
}

const fn default_poll_interval_secs() -> u64 {
    300
}

fn default_allowed_content_types() -> Vec<String> {
    vec![JSON_CONTENT_TYPE.to_owned()]
}

/// Errors produced when validating the input configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The source container name is empty.
    #[error("source container name must not be empty")]
    EmptyContainerName,

    /// The source account name is empty.
    #[error("source account name must not be empty")]
    EmptyAccountName,

    /// The source requested a pool with no workers.
    #[error("max_workers must be at least 1")]
    ZeroMaxWorkers,

    /// Polling is enabled with a zero interval.
    #[error("poll_interval_secs must be at least 1 when polling is enabled")]
    ZeroPollInterval,

    /// The content-type allow-list is empty.
    #[error("allowed_content_types must contain at least one media type")]
    EmptyAllowedContentTypes,
}

/// Configuration for one remote object-storage container to ingest from.
///
/// `max_workers` sizes the worker pool created for this source; `poll` and
/// `poll_interval_secs` drive the external enumerator that discovers blobs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Name of the container (bucket) to enumerate.
    pub container_name: String,
    /// Name of the storage account owning the container.
    pub account_name: String,
    /// Number of concurrent workers downloading and parsing blobs.
    #[serde(default = "default_max_workers")]
    pub max_workers: u16,
    /// Whether the enumerator keeps polling for new blobs after the first sweep.
    #[serde(default)]
    pub poll: bool,
    /// Seconds between enumeration sweeps when polling is enabled.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl SourceConfig {
    /// Validates the source configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.container_name.trim().is_empty() {
            return Err(ValidationError::EmptyContainerName);
        }

        if self.account_name.trim().is_empty() {
            return Err(ValidationError::EmptyAccountName);
        }

        if self.max_workers == 0 {
            return Err(ValidationError::ZeroMaxWorkers);
        }

        if self.poll && self.poll_interval_secs == 0 {
            return Err(ValidationError::ZeroPollInterval);
        }

        Ok(())
    }
}

/// Top-level configuration of the object-storage input.
///
/// This intentionally does not implement [`Serialize`]: connection strings and
/// credentials may be layered into this structure by callers, and we do not
/// want them to leak into serialized forms.
#[derive(Clone, Debug, Deserialize)]
pub struct InputConfig {
    /// The sources this input ingests from.
    pub sources: Vec<SourceConfig>,
    /// Media types a job is permitted to parse as structured data.
    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,
}

impl InputConfig {
    /// Validates the input configuration and each contained source.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.allowed_content_types.is_empty() {
            return Err(ValidationError::EmptyAllowedContentTypes);
        }

        for source in &self.sources {
            source.validate()?;
        }

        Ok(())
    }
}

impl crate::load::Config for InputConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["allowed_content_types"];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_source() -> SourceConfig {
        SourceConfig {
            container_name: "telemetry".to_owned(),
            account_name: "acme".to_owned(),
            max_workers: 2,
            poll: true,
            poll_interval_secs: 300,
        }
    }

    #[test]
    fn valid_source_passes_validation() {
        assert_eq!(valid_source().validate(), Ok(()));
    }

    #[test]
    fn empty_container_name_is_rejected() {
        let mut source = valid_source();
        source.container_name = "  ".to_owned();
        assert_eq!(
            source.validate(),
            Err(ValidationError::EmptyContainerName)
        );
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut source = valid_source();
        source.max_workers = 0;
        assert_eq!(source.validate(), Err(ValidationError::ZeroMaxWorkers));
    }

    #[test]
    fn zero_poll_interval_is_rejected_only_when_polling() {
        let mut source = valid_source();
        source.poll_interval_secs = 0;
        assert_eq!(source.validate(), Err(ValidationError::ZeroPollInterval));

        source.poll = false;
        assert_eq!(source.validate(), Ok(()));
    }

    #[test]
    fn input_defaults_allow_json_only() {
        let input: InputConfig = serde_json::from_value(serde_json::json!({
            "sources": [],
        }))
        .unwrap();

        assert_eq!(input.allowed_content_types, vec![JSON_CONTENT_TYPE]);
    }
}
