use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::error::ConfigError;
use super::types::{Config, HttpConfig, MqttConfig, PipelineConfig};

/// Parsed config document, before any section is extracted.
#[derive(Debug, Clone)]
pub struct Document {
    root: Value,
}

impl Document {
    /// Read and parse a YAML file.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        debug!(path = %path.display(), "loading configuration");

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&contents)
    }

    /// Parse a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_yaml::from_str(yaml)?;
        Ok(Self { root })
    }

    /// Extract a top-level mapping by name.
    pub fn section(&self, name: &str) -> Result<Section, ConfigError> {
        let map = self
            .root
            .get(name)
            .and_then(Value::as_mapping)
            .ok_or_else(|| ConfigError::MissingSection(name.to_string()))?;

        Ok(Section {
            name: name.to_string(),
            map: map.clone(),
        })
    }
}

/// Load a single named section from a config file.
pub fn load_section<P: AsRef<Path>>(path: P, section: &str) -> Result<Section, ConfigError> {
    Document::read(path)?.section(section)
}

/// One top-level section of the config document with typed lookups.
#[derive(Debug, Clone)]
pub struct Section {
    name: String,
    map: Mapping,
}

impl Section {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a key that must be present and well-typed.
    pub fn required<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        self.optional(key)?.ok_or_else(|| ConfigError::MissingField {
            section: self.name.clone(),
            key: key.to_string(),
        })
    }

    /// Look up a key that may be absent. A present key of the wrong type is
    /// still an error.
    pub fn optional<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.map.get(key) {
            None => Ok(None),
            Some(value) => serde_yaml::from_value(value.clone())
                .map(Some)
                .map_err(|e| ConfigError::invalid(&self.name, key, e.to_string())),
        }
    }

    /// Look up an optional humantime duration such as `"30s"` or `"250ms"`.
    pub fn duration(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        Ok(self
            .optional::<humantime_serde::Serde<Duration>>(key)?
            .map(humantime_serde::Serde::into_inner))
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_document(&Document::read(path)?)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Self::from_document(&Document::parse(yaml)?)
    }

    fn from_document(doc: &Document) -> Result<Self, ConfigError> {
        let pipeline = PipelineConfig::from_section(&doc.section("pipeline")?)?;
        info!(
            retries = pipeline.retries,
            backoff_secs = pipeline.backoff.as_secs(),
            queue = pipeline.queue,
            overflow = ?pipeline.overflow,
            "forwarder config"
        );

        let http = HttpConfig::from_section(&doc.section("http")?)?;
        info!(
            workers = http.workers,
            url = %http.url,
            timeout_secs = http.timeout.as_secs(),
            "HTTP config"
        );

        let mqtt = MqttConfig::from_section(&doc.section("mqtt")?)?;
        info!(
            broker = %mqtt.broker,
            port = mqtt.port,
            client_id = %mqtt.client_id,
            topics = ?mqtt.topics,
            "MQTT config"
        );

        Ok(Self { pipeline, http, mqtt })
    }
}
