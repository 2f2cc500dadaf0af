use serde::Deserialize;
use std::time::Duration;

use super::error::ConfigError;
use super::loader::Section;

/// Root configuration for m2http
#[derive(Debug, Clone)]
pub struct Config {
    /// Forwarding pipeline settings
    pub pipeline: PipelineConfig,

    /// HTTP delivery settings
    pub http: HttpConfig,

    /// MQTT subscription settings
    pub mqtt: MqttConfig,
}

impl Config {
    /// Propagate the command line debug flag into the components that honour it.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.http.debug = debug;
        self.mqtt.debug = debug;
        self
    }
}

/// What submission does when the intake queue is full.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Overflow {
    /// Wait for the engine to free a slot.
    #[default]
    Block,
    /// Fail the submission immediately.
    Reject,
}

/// Forwarding pipeline configuration (`pipeline` section)
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Extra delivery attempts after the first failure
    pub retries: u32,

    /// Delay between delivery attempts
    pub backoff: Duration,

    /// Intake queue capacity
    pub queue: usize,

    /// Full-queue policy
    pub overflow: Overflow,
}

impl PipelineConfig {
    pub fn from_section(section: &Section) -> Result<Self, ConfigError> {
        let config = Self {
            retries: section.required("retries")?,
            backoff: Duration::from_secs(section.required("backoff")?),
            queue: section.required("queue")?,
            overflow: section.optional("overflow")?.unwrap_or_default(),
        };

        if config.queue == 0 {
            return Err(ConfigError::invalid(section.name(), "queue", "must be greater than zero"));
        }

        Ok(config)
    }
}

/// Upper bound on concurrent HTTP deliveries.
pub const MAX_WORKERS: usize = 4096;

/// HTTP delivery configuration (`http` section)
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Concurrent deliveries
    pub workers: usize,

    /// Base URL; the destination hint is appended as a path segment
    pub url: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Log every response at debug level
    pub debug: bool,
}

impl HttpConfig {
    pub fn from_section(section: &Section) -> Result<Self, ConfigError> {
        let config = Self {
            workers: section.optional("workers")?.unwrap_or_else(default_workers),
            url: section.required("url")?,
            timeout: section.duration("timeout")?.unwrap_or_else(default_http_timeout),
            debug: false,
        };

        if config.workers == 0 || config.workers > MAX_WORKERS {
            return Err(ConfigError::invalid(
                section.name(),
                "workers",
                format!("must be between 1 and {MAX_WORKERS}"),
            ));
        }
        if config.url.trim().is_empty() {
            return Err(ConfigError::invalid(section.name(), "url", "must not be empty"));
        }

        Ok(config)
    }
}

fn default_workers() -> usize {
    1
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

/// MQTT subscription configuration (`mqtt` section)
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// Broker host name or address
    pub broker: String,

    /// Broker port
    pub port: u16,

    /// MQTT client identifier
    pub client_id: String,

    /// Topics to subscribe to, in order
    pub topics: Vec<String>,

    /// Subscription QoS level (0, 1 or 2)
    pub qos: u8,

    /// Keep-alive interval
    pub keep_alive: Duration,

    /// Upper bound on the initial connect
    pub connect_timeout: Duration,

    /// Log every inbound payload at debug level
    pub debug: bool,
}

impl MqttConfig {
    pub fn from_section(section: &Section) -> Result<Self, ConfigError> {
        let name = section.name();
        let config = Self {
            broker: section.required("broker")?,
            port: section.required("port")?,
            client_id: section.required("clientid")?,
            topics: section.optional("topics")?.unwrap_or_default(),
            qos: section.optional("qos")?.unwrap_or(0),
            keep_alive: section.duration("keep_alive")?.unwrap_or_else(default_keep_alive),
            connect_timeout: section
                .duration("connect_timeout")?
                .unwrap_or_else(default_connect_timeout),
            debug: false,
        };

        if config.broker.trim().is_empty() {
            return Err(ConfigError::invalid(name, "broker", "must not be empty"));
        }
        // The MQTT client refuses empty identifiers and identifiers with a leading space.
        if config.client_id.is_empty() || config.client_id.starts_with(' ') {
            return Err(ConfigError::invalid(name, "clientid", "must be non-empty without leading spaces"));
        }
        if config.keep_alive < Duration::from_secs(1) {
            return Err(ConfigError::invalid(name, "keep_alive", "must be at least 1s"));
        }
        if config.qos > 2 {
            return Err(ConfigError::invalid(name, "qos", "must be 0, 1 or 2"));
        }
        if config.topics.iter().any(|t| t.is_empty()) {
            return Err(ConfigError::invalid(name, "topics", "topic filters must not be empty"));
        }

        Ok(config)
    }
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Document;

    fn section(yaml: &str, name: &str) -> Section {
        Document::parse(yaml).unwrap().section(name).unwrap()
    }

    #[test]
    fn test_pipeline_overflow_policy() {
        let s = section("pipeline: { retries: 0, backoff: 0, queue: 1, overflow: reject }", "pipeline");
        let config = PipelineConfig::from_section(&s).unwrap();
        assert_eq!(config.overflow, Overflow::Reject);
        assert_eq!(config.backoff, Duration::ZERO);

        let s = section("pipeline: { retries: 0, backoff: 0, queue: 1, overflow: drop }", "pipeline");
        assert!(PipelineConfig::from_section(&s).is_err());
    }

    #[test]
    fn test_pipeline_rejects_zero_queue() {
        let s = section("pipeline: { retries: 1, backoff: 1, queue: 0 }", "pipeline");
        let err = PipelineConfig::from_section(&s).unwrap_err();
        assert!(err.to_string().contains("queue"));
    }

    #[test]
    fn test_pipeline_rejects_negative_retries() {
        let s = section("pipeline: { retries: -1, backoff: 1, queue: 10 }", "pipeline");
        assert!(matches!(
            PipelineConfig::from_section(&s),
            Err(ConfigError::InvalidField { ref key, .. }) if key == "retries"
        ));
    }

    #[test]
    fn test_http_workers_default() {
        let s = section("http: { url: \"http://localhost\" }", "http");
        let config = HttpConfig::from_section(&s).unwrap();
        assert_eq!(config.workers, 1);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_http_workers_bounds() {
        let s = section("http: { url: \"http://localhost\", workers: 4096 }", "http");
        assert_eq!(HttpConfig::from_section(&s).unwrap().workers, MAX_WORKERS);

        for workers in ["0", "4097", "4611686018427387904"] {
            let yaml = format!("http: {{ url: \"http://localhost\", workers: {workers} }}");
            assert!(
                matches!(
                    HttpConfig::from_section(&section(&yaml, "http")),
                    Err(ConfigError::InvalidField { ref key, .. }) if key == "workers"
                ),
                "workers = {workers}"
            );
        }
    }

    #[test]
    fn test_http_url_required() {
        let s = section("http: { workers: 2 }", "http");
        assert!(matches!(
            HttpConfig::from_section(&s),
            Err(ConfigError::MissingField { ref key, .. }) if key == "url"
        ));

        let s = section("http: { url: \"  \" }", "http");
        assert!(HttpConfig::from_section(&s).is_err());
    }

    #[test]
    fn test_http_timeout() {
        let s = section("http: { url: \"http://localhost\", timeout: 1500ms }", "http");
        let config = HttpConfig::from_section(&s).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_mqtt_topics_optional() {
        let s = section("mqtt: { broker: localhost, port: 1883, clientid: test }", "mqtt");
        let config = MqttConfig::from_section(&s).unwrap();
        assert!(config.topics.is_empty());
        assert_eq!(config.keep_alive, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_mqtt_required_fields() {
        for missing in ["broker", "port", "clientid"] {
            let mut fields = vec!["broker: localhost", "port: 1883", "clientid: test"];
            fields.retain(|f| !f.starts_with(missing));
            let yaml = format!("mqtt: {{ {} }}", fields.join(", "));
            let err = MqttConfig::from_section(&section(&yaml, "mqtt")).unwrap_err();
            assert!(
                matches!(err, ConfigError::MissingField { ref key, .. } if key == missing),
                "expected missing {missing}, got {err}"
            );
        }
    }

    #[test]
    fn test_mqtt_validation() {
        let s = section("mqtt: { broker: localhost, port: 1883, clientid: \" x\" }", "mqtt");
        assert!(MqttConfig::from_section(&s).is_err());

        let s = section("mqtt: { broker: localhost, port: 1883, clientid: x, qos: 3 }", "mqtt");
        assert!(MqttConfig::from_section(&s).is_err());

        let s = section("mqtt: { broker: localhost, port: 1883, clientid: x, keep_alive: 10ms }", "mqtt");
        assert!(MqttConfig::from_section(&s).is_err());

        let s = section("mqtt: { broker: localhost, port: 70000, clientid: x }", "mqtt");
        assert!(MqttConfig::from_section(&s).is_err());

        let s = section("mqtt: { broker: localhost, port: 1883, clientid: x, topics: [a, \"\"] }", "mqtt");
        assert!(MqttConfig::from_section(&s).is_err());
    }

    #[test]
    fn test_with_debug() {
        let yaml = r#"
pipeline: { retries: 0, backoff: 0, queue: 1 }
http: { url: "http://localhost" }
mqtt: { broker: localhost, port: 1883, clientid: x }
"#;
        let config = Config::from_yaml(yaml).unwrap().with_debug(true);
        assert!(config.http.debug);
        assert!(config.mqtt.debug);
    }
}
