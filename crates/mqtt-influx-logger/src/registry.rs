// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic registry.
//!
//! Maps every subscribed MQTT topic to the measurement, tag set and field
//! it is written to. Built once from configuration and never mutated.

use crate::config::{BridgeConfig, ConfigError, MeasurementConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Field key used when a field has no explicit name.
pub const DEFAULT_FIELD: &str = "value";

/// Declared type of a topic's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    #[serde(alias = "integer")]
    Int,
    #[serde(alias = "boolean")]
    Bool,
    #[default]
    Float,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::String => "string",
            ValueType::Int => "int",
            ValueType::Bool => "bool",
            ValueType::Float => "float",
        };
        f.write_str(name)
    }
}

/// Where and how one topic is written.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicSpec {
    /// Target measurement.
    pub measurement: String,
    /// Tag set inherited from the measurement.
    pub tags: BTreeMap<String, String>,
    /// Field key.
    pub field: String,
    /// Declared value type.
    pub value_type: ValueType,
    /// State-change signal.
    pub momentary: bool,
}

/// Immutable topic -> spec mapping.
#[derive(Debug, Clone, Default)]
pub struct TopicRegistry {
    topics: HashMap<String, TopicSpec>,
}

impl TopicRegistry {
    /// Build the registry from a validated configuration.
    ///
    /// Fails if the same topic feeds two fields.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, ConfigError> {
        Self::from_measurements(&config.measurements)
    }

    /// Build the registry from measurement declarations.
    pub fn from_measurements(measurements: &[MeasurementConfig]) -> Result<Self, ConfigError> {
        let mut topics: HashMap<String, TopicSpec> = HashMap::new();

        for measurement in measurements {
            for field in &measurement.fields {
                let spec = TopicSpec {
                    measurement: measurement.name.clone(),
                    tags: measurement.tags.clone(),
                    field: field
                        .name
                        .clone()
                        .unwrap_or_else(|| DEFAULT_FIELD.to_string()),
                    value_type: field.value_type,
                    momentary: field.momentary,
                };

                if let Some(existing) = topics.get(&field.topic) {
                    return Err(ConfigError::DuplicateTopic {
                        topic: field.topic.clone(),
                        first: format!("{}.{}", existing.measurement, existing.field),
                        second: format!("{}.{}", spec.measurement, spec.field),
                    });
                }
                topics.insert(field.topic.clone(), spec);
            }
        }

        Ok(Self { topics })
    }

    /// Look up the spec for a topic.
    pub fn lookup(&self, topic: &str) -> Option<&TopicSpec> {
        self.topics.get(topic)
    }

    /// All registered topic names, sorted.
    pub fn topics(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.topics.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Iterate over `(topic, spec)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TopicSpec)> {
        self.topics.iter().map(|(t, s)| (t.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
