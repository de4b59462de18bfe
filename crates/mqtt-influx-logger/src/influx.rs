// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB Line Protocol encoding and HTTP writer.
//!
//! Line Protocol format:
//! ```text
//! measurement,tag1=val1,tag2=val2 field=value timestamp_ns
//! ```
//!
//! See: <https://docs.influxdata.com/influxdb/v2/reference/syntax/line-protocol/>

use crate::config::InfluxDbConfig;
use crate::registry::TopicSpec;
use crate::sink::{SinkFuture, SinkWriter, WriteError};
use std::collections::BTreeMap;
use std::fmt;

/// A value that can be stored in an InfluxDB field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 64-bit floating point.
    Float(f64),
    /// 64-bit signed integer.
    Integer(i64),
    /// UTF-8 string.
    String(String),
    /// Boolean value.
    Boolean(bool),
}

impl FieldValue {
    /// Format this value for InfluxDB Line Protocol.
    ///
    /// - Float: written as-is (e.g., `3.14`)
    /// - Integer: suffixed with `i` (e.g., `42i`)
    /// - String: quoted with double quotes, inner quotes escaped (e.g., `"hello"`)
    /// - Boolean: `true` or `false`
    pub fn to_line_protocol(&self) -> String {
        match self {
            FieldValue::Float(v) => format!("{}", v),
            FieldValue::Integer(v) => format!("{}i", v),
            FieldValue::String(v) => {
                let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{}\"", escaped)
            }
            FieldValue::Boolean(v) => v.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_line_protocol())
    }
}

/// One point to be written: a single field of a measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub field: String,
    pub value: FieldValue,
    /// Nanoseconds since the Unix epoch.
    pub timestamp_ns: i64,
}

impl Sample {
    /// Build a sample for `spec` carrying `value`.
    pub fn new(spec: &TopicSpec, value: FieldValue, timestamp_ns: i64) -> Self {
        Self {
            measurement: spec.measurement.clone(),
            tags: spec.tags.clone(),
            field: spec.field.clone(),
            value,
            timestamp_ns,
        }
    }

    /// Encode as a single Line Protocol line (no trailing newline).
    ///
    /// Tags come out sorted by key.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape_measurement(&self.measurement);

        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        line.push(' ');
        line.push_str(&escape_key(&self.field));
        line.push('=');
        line.push_str(&self.value.to_line_protocol());

        line.push(' ');
        line.push_str(&self.timestamp_ns.to_string());
        line
    }
}

/// Escape measurement name per Line Protocol spec.
/// Spaces and commas must be escaped with backslash.
fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

/// Escape tag keys, tag values and field keys.
/// Commas, equals signs, and spaces must be escaped.
fn escape_key(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

/// Writes samples to InfluxDB over HTTP, one request per sample.
pub struct InfluxWriter {
    http: reqwest::Client,
    config: InfluxDbConfig,
    write_url: String,
}

impl InfluxWriter {
    /// Create a writer for the configured 1.x database or 2.x bucket.
    pub fn new(config: InfluxDbConfig) -> Result<Self, WriteError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| WriteError::Http(format!("HTTP client: {e}")))?;
        let base = config.url.trim_end_matches('/');
        let write_url = if config.is_v2() {
            format!("{base}/api/v2/write")
        } else {
            format!("{base}/write")
        };

        Ok(Self {
            http,
            config,
            write_url,
        })
    }

    fn query_params(&self) -> Vec<(&'static str, &str)> {
        let mut params = vec![("precision", "ns")];
        if self.config.is_v2() {
            if let Some(org) = self.config.org.as_deref() {
                params.push(("org", org));
            }
            if let Some(bucket) = self.config.bucket.as_deref() {
                params.push(("bucket", bucket));
            }
        } else {
            if let Some(db) = self.config.database.as_deref() {
                params.push(("db", db));
            }
        }
        params
    }

    /// Attach credentials as headers so they never end up in a URL.
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = self.config.token.as_deref() {
            return request.header("Authorization", format!("Token {token}"));
        }
        match self.config.username.as_deref() {
            Some(user) => request.basic_auth(user, self.config.password.as_deref()),
            None => request,
        }
    }

    fn write_request(&self, line: String) -> reqwest::RequestBuilder {
        let request = self
            .http
            .post(&self.write_url)
            .query(&self.query_params())
            .body(line);
        self.authorize(request)
    }

    /// Create the 1.x database if `create_database` is set.
    ///
    /// `CREATE DATABASE` is idempotent on the server side.
    pub async fn ensure_database(&self) -> Result<(), WriteError> {
        if self.config.is_v2() || !self.config.create_database {
            return Ok(());
        }
        let Some(db) = self.config.database.as_deref() else {
            return Ok(());
        };

        let url = format!("{}/query", self.config.url.trim_end_matches('/'));
        let statement = format!("CREATE DATABASE \"{}\"", db.replace('"', "\\\""));
        let resp = self
            .authorize(self.http.post(&url).query(&[("q", statement.as_str())]))
            .send()
            .await
            .map_err(request_error)?;
        check_status(resp).await?;

        tracing::info!(database = db, "InfluxDB database ready");
        Ok(())
    }

    async fn post_line(&self, line: String) -> Result<(), WriteError> {
        let resp = self
            .write_request(line)
            .send()
            .await
            .map_err(request_error)?;
        check_status(resp).await
    }
}

fn request_error(e: reqwest::Error) -> WriteError {
    WriteError::Http(format!("InfluxDB request: {}", e.without_url()))
}

async fn check_status(resp: reqwest::Response) -> Result<(), WriteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(WriteError::Status {
        status: status.as_u16(),
        body,
    })
}

impl SinkWriter for InfluxWriter {
    fn write<'a>(&'a self, sample: &'a Sample) -> SinkFuture<'a> {
        Box::pin(self.post_line(sample.to_line_protocol()))
    }
}
