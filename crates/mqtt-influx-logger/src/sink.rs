// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sample sink abstraction.

use crate::influx::Sample;
use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by a [`SinkWriter`].
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("store rejected write (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Boxed future returned by [`SinkWriter::write`].
pub type SinkFuture<'a> = Pin<Box<dyn Future<Output = Result<(), WriteError>> + Send + 'a>>;

/// Durably records one sample.
///
/// Called from the flush pass, never while the sample buffer is locked.
pub trait SinkWriter: Send + Sync {
    fn write<'a>(&'a self, sample: &'a Sample) -> SinkFuture<'a>;
}

impl<T: SinkWriter + ?Sized> SinkWriter for Arc<T> {
    fn write<'a>(&'a self, sample: &'a Sample) -> SinkFuture<'a> {
        (**self).write(sample)
    }
}

impl<T: SinkWriter + ?Sized> SinkWriter for Box<T> {
    fn write<'a>(&'a self, sample: &'a Sample) -> SinkFuture<'a> {
        (**self).write(sample)
    }
}

/// Prints Line Protocol to stdout instead of writing to a store (dry run).
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl SinkWriter for StdoutSink {
    fn write<'a>(&'a self, sample: &'a Sample) -> SinkFuture<'a> {
        Box::pin(async move {
            let mut out = std::io::stdout();
            writeln!(out, "{}", sample.to_line_protocol())?;
            Ok::<(), WriteError>(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::influx::FieldValue;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_stdout_sink_accepts_samples() {
        let sink: Box<dyn SinkWriter> = Box::new(StdoutSink);
        let sample = Sample {
            measurement: "m".to_string(),
            tags: BTreeMap::new(),
            field: "value".to_string(),
            value: FieldValue::Integer(1),
            timestamp_ns: 0,
        };
        assert!(sink.write(&sample).await.is_ok());
    }

    #[test]
    fn test_write_error_display() {
        let err = WriteError::Status {
            status: 400,
            body: "bad line".to_string(),
        };
        assert_eq!(err.to_string(), "store rejected write (status 400): bad line");
    }
}
