//! Per-invocation diagnostic capture.
//!
//! Every dispatch runs under a scoped `tracing` subscriber whose writer is a
//! [`FanOutSink`]. The fan-out forwards each formatted record to the live
//! destination (operator visibility) and to a [`BufferSink`] created for that
//! dispatch alone. The buffer's text becomes the response's `log` field, so a
//! caller sees exactly what happened during one request even when the live
//! destination is discarded.
//!
//! The buffer always receives single-line text. When the live destination
//! expects JSON records, it gets its own JSON formatter instead of sharing
//! the fan-out, so a process logging JSON never sees text lines on the same
//! stream. [`record_layer`] is the one place both formats are configured; the
//! process-wide subscriber uses it too.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, MakeWriter, time::UtcTime};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::{LookupSpan, Registry};

/// Layout of a formatted diagnostic record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordFormat {
    /// One human-readable line per record.
    #[default]
    Text,
    /// One flattened JSON object per record.
    Json,
}

/// Builds the formatting layer used for every diagnostic destination:
/// target and level included, RFC 3339 UTC timestamps, no ANSI colour.
pub fn record_layer<S, W>(format: RecordFormat, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_timer(UtcTime::rfc_3339());
    match format {
        RecordFormat::Text => layer.compact().boxed(),
        RecordFormat::Json => layer.json().flatten_event(true).boxed(),
    }
}

/// Destination for formatted diagnostic records.
pub trait RecordSink: Send + Sync {
    /// Accepts one formatted record.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the destination rejects the record.
    fn accept(&self, record: &[u8]) -> io::Result<()>;
}

/// Retains every record in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    buffer: Mutex<Vec<u8>>,
}

impl BufferSink {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the retained text, replacing invalid UTF-8.
    #[must_use]
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl RecordSink for BufferSink {
    fn accept(&self, record: &[u8]) -> io::Result<()> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(record);
        Ok(())
    }
}

/// Forwards records to an [`io::Write`] destination such as stderr.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W> WriterSink<W> {
    /// Wraps a writer.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> RecordSink for WriterSink<W> {
    fn accept(&self, record: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(record)?;
        writer.flush()
    }
}

/// Ordered list of sinks that each receive every record.
#[derive(Clone, Default)]
pub struct FanOutSink {
    sinks: Vec<Arc<dyn RecordSink>>,
}

impl FanOutSink {
    /// Creates a fan-out over `sinks`, delivered in order.
    #[must_use]
    pub const fn new(sinks: Vec<Arc<dyn RecordSink>>) -> Self {
        Self { sinks }
    }

    /// Returns the number of destinations.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns `true` when there are no destinations.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl<'a> MakeWriter<'a> for FanOutSink {
    type Writer = FanOutWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        FanOutWriter { sinks: &self.sinks }
    }
}

/// Writer handed to the formatter for one record.
///
/// A failing sink does not stop delivery to the remaining sinks; the first
/// failure is reported once every sink has been offered the record.
pub struct FanOutWriter<'a> {
    sinks: &'a [Arc<dyn RecordSink>],
}

impl Write for FanOutWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut first_error = None;
        for sink in self.sinks {
            if let Err(error) = sink.accept(buf) {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(buf.len()), Err)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Errors raised while configuring diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagnosticsError {
    /// The filter expression could not be parsed.
    #[error("invalid diagnostic filter '{filter}': {message}")]
    Filter {
        /// The rejected expression.
        filter: String,
        /// Parser description.
        message: String,
    },
}

/// Installs the fan-out subscriber around each dispatch.
#[derive(Clone)]
pub struct DiagnosticSink {
    live: Option<Arc<dyn RecordSink>>,
    live_format: RecordFormat,
    filter: String,
}

impl DiagnosticSink {
    /// Creates a sink that mirrors records to `live` as well as the
    /// per-invocation buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DiagnosticsError::Filter`] when `filter` is not a valid
    /// `EnvFilter` expression.
    pub fn new(live: Arc<dyn RecordSink>, filter: &str) -> Result<Self, DiagnosticsError> {
        EnvFilter::try_new(filter).map_err(|error| DiagnosticsError::Filter {
            filter: filter.to_owned(),
            message: error.to_string(),
        })?;
        Ok(Self {
            live: Some(live),
            live_format: RecordFormat::Text,
            filter: filter.to_owned(),
        })
    }

    /// Creates a sink with no live destination; records reach only the
    /// per-invocation buffer.
    #[must_use]
    pub fn discard() -> Self {
        Self {
            live: None,
            live_format: RecordFormat::Text,
            filter: String::from("info"),
        }
    }

    /// Formats records for the live destination as `format`. The
    /// per-invocation buffer stays text.
    #[must_use]
    pub const fn with_live_format(mut self, format: RecordFormat) -> Self {
        self.live_format = format;
        self
    }

    /// Returns the format used for the live destination.
    #[must_use]
    pub const fn live_format(&self) -> RecordFormat {
        self.live_format
    }

    /// Returns the filter expression.
    #[must_use]
    pub const fn filter(&self) -> &str {
        self.filter.as_str()
    }

    /// Runs `operation` with a fresh buffer attached, returning its value and
    /// the text recorded while it ran.
    #[must_use]
    pub fn capture<T>(&self, operation: impl FnOnce() -> T) -> (T, String) {
        let buffer = Arc::new(BufferSink::new());
        let mut text_sinks: Vec<Arc<dyn RecordSink>> = Vec::with_capacity(2);
        let mut json_live = None;
        if let Some(live) = &self.live {
            match self.live_format {
                RecordFormat::Text => text_sinks.push(Arc::clone(live)),
                RecordFormat::Json => json_live = Some(Arc::clone(live)),
            }
        }
        text_sinks.push(Arc::clone(&buffer) as Arc<dyn RecordSink>);

        let filter = EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = Registry::default()
            .with(filter)
            .with(record_layer(RecordFormat::Text, FanOutSink::new(text_sinks)))
            .with(json_live.map(|live| {
                record_layer(RecordFormat::Json, FanOutSink::new(vec![live]))
            }));

        let value = tracing::subscriber::with_default(subscriber, operation);
        (value, buffer.contents())
    }
}

impl std::fmt::Debug for DiagnosticSink {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DiagnosticSink")
            .field("live", &self.live.is_some())
            .field("live_format", &self.live_format)
            .field("filter", &self.filter)
            .finish()
    }
}
