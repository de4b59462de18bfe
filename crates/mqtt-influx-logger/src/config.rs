// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logger configuration.
//!
//! One document describes the MQTT broker, the InfluxDB target and the
//! measurement/field layout. YAML and the legacy JSON format are both
//! accepted; the format is picked from the file extension.

use crate::registry::ValueType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
///
/// All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Topic '{topic}' is mapped twice ({first} and {second})")]
    DuplicateTopic {
        topic: String,
        first: String,
        second: String,
    },
}

/// Top-level logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Minimum seconds between two writes of the same topic.
    pub min_write_interval: u64,

    /// Flush pass period in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Use strict boolean parsing instead of the `"0"` = false rule.
    #[serde(default)]
    pub strict_bool: bool,

    /// MQTT broker connection settings.
    pub mqtt: MqttConfig,

    /// InfluxDB connection settings.
    pub influxdb: InfluxDbConfig,

    /// Measurements and the topics feeding their fields.
    pub measurements: Vec<MeasurementConfig>,
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host name or address.
    pub host: String,

    /// Broker port.
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// MQTT client identifier.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

/// InfluxDB connection settings.
///
/// Set `database` for the 1.x API or `org` + `bucket` for the 2.x API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfluxDbConfig {
    /// InfluxDB URL (e.g., "http://localhost:8086").
    pub url: String,

    /// 1.x database name.
    #[serde(default)]
    pub database: Option<String>,

    /// 1.x user name.
    #[serde(default)]
    pub username: Option<String>,

    /// 1.x password.
    #[serde(default)]
    pub password: Option<String>,

    /// Issue `CREATE DATABASE` at startup (1.x only).
    #[serde(default)]
    pub create_database: bool,

    /// 2.x organization.
    #[serde(default)]
    pub org: Option<String>,

    /// 2.x bucket.
    #[serde(default)]
    pub bucket: Option<String>,

    /// 2.x authentication token.
    #[serde(default)]
    pub token: Option<String>,
}

/// One InfluxDB measurement and the fields written into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementConfig {
    /// Measurement name.
    pub name: String,

    /// Tag set shared by every field of this measurement.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// Fields, each fed by one MQTT topic.
    pub fields: Vec<FieldConfig>,
}

/// One field of a measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Field key; `"value"` when omitted.
    #[serde(default)]
    pub name: Option<String>,

    /// Source MQTT topic.
    pub topic: String,

    /// Declared value type.
    #[serde(rename = "type", default)]
    pub value_type: ValueType,

    /// State-change signal, written promptly on change.
    #[serde(default)]
    pub momentary: bool,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "mqtt-influx-logger".to_string()
}

fn default_keep_alive() -> u64 {
    30
}

impl BridgeConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file.
    ///
    /// `.json` and `.conf` files are read as JSON, anything else as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") | Some("conf") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Validate the configuration.
    ///
    /// Duplicate topics are caught when the registry is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_write_interval == 0 {
            return Err(ConfigError::Invalid(
                "min_write_interval must be a positive number of seconds".into(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick_interval_ms must be positive".into(),
            ));
        }
        if self.mqtt.host.is_empty() {
            return Err(ConfigError::Invalid("mqtt.host is empty".into()));
        }
        self.influxdb.validate()?;

        for (i, measurement) in self.measurements.iter().enumerate() {
            if measurement.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "Measurement {} has an empty name",
                    i
                )));
            }
            for field in &measurement.fields {
                if field.topic.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "Measurement '{}' has a field with an empty topic",
                        measurement.name
                    )));
                }
                if matches!(field.name.as_deref(), Some("")) {
                    return Err(ConfigError::Invalid(format!(
                        "Field for topic '{}' has an empty name",
                        field.topic
                    )));
                }
            }
        }

        Ok(())
    }

    /// Total number of configured fields (one topic each).
    pub fn field_count(&self) -> usize {
        self.measurements.iter().map(|m| m.fields.len()).sum()
    }
}

impl InfluxDbConfig {
    /// Whether this targets the 2.x write API.
    pub fn is_v2(&self) -> bool {
        self.bucket.is_some()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::Invalid("influxdb.url is empty".into()));
        }
        match (&self.database, &self.org, &self.bucket) {
            (_, Some(_), Some(_)) => Ok(()),
            (Some(db), None, None) if !db.is_empty() => Ok(()),
            (_, Some(_), None) | (_, None, Some(_)) => Err(ConfigError::Invalid(
                "influxdb.org and influxdb.bucket must be set together".into(),
            )),
            _ => Err(ConfigError::Invalid(
                "influxdb needs either database or org + bucket".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_YAML: &str = r#"
min_write_interval: 60
mqtt:
  host: "localhost"
influxdb:
  url: "http://localhost:8086"
  database: "home"
measurements:
  - name: "climate"
    fields:
      - topic: "sensors/temp"
"#;

    const FULL_YAML: &str = r#"
min_write_interval: 300
tick_interval_ms: 500
strict_bool: true
mqtt:
  host: "broker.example.com"
  port: 8883
  client_id: "logger-01"
  username: "logger"
  password: "secret"
  keep_alive_secs: 10
influxdb:
  url: "http://influx.example.com:8086"
  org: "example-org"
  bucket: "telemetry"
  token: "test-token-placeholder"
measurements:
  - name: "climate"
    tags:
      room: "kitchen"
      floor: "1"
    fields:
      - name: "temperature"
        topic: "kitchen/temp"
      - name: "humidity"
        topic: "kitchen/hum"
        type: int
  - name: "switches"
    fields:
      - name: "light"
        topic: "kitchen/light"
        type: bool
        momentary: true
"#;

    const LEGACY_JSON: &str = r#"{
  "min_write_interval": 60,
  "mqtt": { "host": "localhost", "port": 1883 },
  "influxdb": { "url": "http://localhost:8086", "database": "home", "create_database": true },
  "measurements": [
    { "name": "power", "tags": { "circuit": "main" },
      "fields": [ { "name": "watts", "topic": "meter/power", "type": "float" },
                  { "name": "state", "topic": "meter/state", "type": "string", "momentary": true } ] }
  ]
}"#;

    #[test]
    fn test_config_parse_minimal() {
        let config = BridgeConfig::from_yaml(MINIMAL_YAML).expect("parse minimal yaml");

        assert_eq!(config.min_write_interval, 60);
        assert_eq!(config.tick_interval_ms, 1000);
        assert!(!config.strict_bool);
        assert_eq!(config.mqtt.host, "localhost");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.client_id, "mqtt-influx-logger");
        assert!(config.mqtt.username.is_none());
        assert_eq!(config.influxdb.database.as_deref(), Some("home"));
        assert!(!config.influxdb.is_v2());

        let field = &config.measurements[0].fields[0];
        assert!(config.measurements[0].tags.is_empty());
        assert!(field.name.is_none());
        assert_eq!(field.value_type, ValueType::Float);
        assert!(!field.momentary);
    }

    #[test]
    fn test_config_parse_all_fields() {
        let config = BridgeConfig::from_yaml(FULL_YAML).expect("parse full yaml");

        assert_eq!(config.min_write_interval, 300);
        assert_eq!(config.tick_interval_ms, 500);
        assert!(config.strict_bool);
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.mqtt.username.as_deref(), Some("logger"));
        assert_eq!(config.mqtt.keep_alive_secs, 10);
        assert!(config.influxdb.is_v2());
        assert_eq!(config.influxdb.token.as_deref(), Some("test-token-placeholder"));

        assert_eq!(config.measurements.len(), 2);
        assert_eq!(config.field_count(), 3);

        let climate = &config.measurements[0];
        assert_eq!(climate.tags.get("room").map(String::as_str), Some("kitchen"));
        assert_eq!(climate.fields[1].value_type, ValueType::Int);

        let light = &config.measurements[1].fields[0];
        assert_eq!(light.value_type, ValueType::Bool);
        assert!(light.momentary);
    }

    #[test]
    fn test_config_parse_legacy_json() {
        let config = BridgeConfig::from_json(LEGACY_JSON).expect("parse json");

        assert!(config.influxdb.create_database);
        assert_eq!(config.measurements[0].fields[1].value_type, ValueType::String);
        assert!(config.measurements[0].fields[1].momentary);
    }

    #[test]
    fn test_config_from_file_picks_format() {
        let mut json = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .expect("tempfile");
        json.write_all(LEGACY_JSON.as_bytes()).expect("write");
        let config = BridgeConfig::from_file(json.path()).expect("load json");
        assert_eq!(config.measurements[0].name, "power");

        let mut yaml = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("tempfile");
        yaml.write_all(FULL_YAML.as_bytes()).expect("write");
        let config = BridgeConfig::from_file(yaml.path()).expect("load yaml");
        assert_eq!(config.measurements[1].name, "switches");
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = BridgeConfig::from_yaml(include_str!("../logger.example.yaml"))
            .expect("example config");
        assert_eq!(config.field_count(), 4);
        assert!(config.influxdb.create_database);
    }

    #[test]
    fn test_config_rejects_zero_interval() {
        let yaml = MINIMAL_YAML.replace("min_write_interval: 60", "min_write_interval: 0");
        assert!(matches!(
            BridgeConfig::from_yaml(&yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_config_rejects_missing_topic() {
        let yaml = MINIMAL_YAML.replace("      - topic: \"sensors/temp\"", "      - name: \"x\"");
        assert!(matches!(
            BridgeConfig::from_yaml(&yaml),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_config_rejects_unknown_type() {
        let yaml = MINIMAL_YAML.replace(
            "      - topic: \"sensors/temp\"",
            "      - topic: \"sensors/temp\"\n        type: decimal",
        );
        assert!(BridgeConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_config_rejects_incomplete_influx_target() {
        let yaml = MINIMAL_YAML.replace("  database: \"home\"", "  org: \"only-org\"");
        assert!(matches!(
            BridgeConfig::from_yaml(&yaml),
            Err(ConfigError::Invalid(_))
        ));
    }
}
