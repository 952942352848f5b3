//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the logging subsystem once per process
//! - Render records as plain text or single-line JSON
//! - Reconfigure level and format at runtime without duplicating output
//!
//! # Design Decisions
//! - Uses the tracing crate; `tracing-subscriber` reload layers hold the filter
//!   and the single console destination, so a second configuration replaces
//!   both instead of stacking a new writer
//! - JSON format for production, plain format for development
//! - Unknown level names fall back to INFO

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use serde::Serialize;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{self, DefaultFields, FormatEvent, FormatFields};
use tracing_subscriber::fmt::{FmtContext, MakeWriter};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Layer, Registry};

/// Targets of the embedded HTTP server's general and access logs.
const SERVER_LOG_TARGETS: &[&str] = &["hyper", "tower_http::trace"];

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid filter directives: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("a global subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
    #[error("failed to reload logging configuration: {0}")]
    Reload(#[from] reload::Error),
    #[error("logging state lock poisoned")]
    Poisoned,
}

/// Minimum severity, ordered DEBUG < INFO < WARNING < ERROR < CRITICAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized log level: {0:?}")]
pub struct UnknownLevel(String);

impl FromStr for LogLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" | "FATAL" => Ok(Self::Critical),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

impl LogLevel {
    /// Parse a level name, falling back to INFO when it is not recognized.
    /// The flag reports whether the name was recognized.
    pub fn resolve(name: &str) -> (Self, bool) {
        match name.parse() {
            Ok(level) => (level, true),
            Err(_) => (Self::Info, false),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    // tracing has no level above ERROR.
    fn directive(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }

    /// Filter directives: this level everywhere, at least WARNING for the
    /// embedded server's targets.
    fn directives(&self) -> String {
        let quiet = (*self).max(Self::Warning).directive();
        let mut directives = self.directive().to_string();
        for target in SERVER_LOG_TARGETS {
            directives.push_str(&format!(",{target}={quiet}"));
        }
        directives
    }

    fn filter(&self) -> Result<EnvFilter, LoggingError> {
        Ok(EnvFilter::try_new(self.directives())?)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Plain
        }
    }
}

/// Event formatter for both output layouts.
#[derive(Debug, Clone, Copy)]
pub struct RecordFormat {
    format: LogFormat,
}

impl RecordFormat {
    pub fn new(format: LogFormat) -> Self {
        Self { format }
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    timestamp: String,
    level: &'static str,
    logger: &'a str,
    message: String,
    module: Option<&'a str>,
    function: Option<&'a str>,
    line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception: Option<String>,
}

fn level_name(level: &tracing::Level) -> &'static str {
    match *level {
        tracing::Level::TRACE => "TRACE",
        tracing::Level::DEBUG => "DEBUG",
        tracing::Level::INFO => "INFO",
        tracing::Level::WARN => "WARNING",
        tracing::Level::ERROR => "ERROR",
    }
}

impl<S, N> FormatEvent<S, N> for RecordFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let mut fields = RecordFields::default();
        event.record(&mut fields);

        let function = ctx.lookup_current().map(|span| span.name());
        let message = fields.message_with_extras();

        match self.format {
            LogFormat::Plain => {
                write!(
                    writer,
                    "{} - {} - {} - {}:{}:{} - {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                    meta.target(),
                    level_name(meta.level()),
                    meta.module_path().unwrap_or("-"),
                    function.unwrap_or("-"),
                    meta.line().unwrap_or(0),
                    message,
                )?;
                if let Some(exception) = &fields.exception {
                    write!(writer, "\n{exception}")?;
                }
                writeln!(writer)
            }
            LogFormat::Json => {
                let record = JsonRecord {
                    timestamp: chrono::Utc::now()
                        .to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
                    level: level_name(meta.level()),
                    logger: meta.target(),
                    message,
                    module: meta.module_path(),
                    function,
                    line: meta.line(),
                    exception: fields.exception,
                };
                let json = serde_json::to_string(&record).map_err(|_| fmt::Error)?;
                writeln!(writer, "{json}")
            }
        }
    }
}

#[derive(Default)]
struct RecordFields {
    message: String,
    exception: Option<String>,
    extras: Vec<(&'static str, String)>,
}

impl RecordFields {
    fn push(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            "exception" | "error" => self.exception = Some(value),
            name => self.extras.push((name, value)),
        }
    }

    fn message_with_extras(&self) -> String {
        let mut message = self.message.clone();
        for (name, value) in &self.extras {
            message.push_str(&format!(" {name}={value}"));
        }
        message
    }
}

impl Visit for RecordFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{value:?}"));
    }
}

/// The console destination: one `fmt` layer using [`RecordFormat`].
pub fn output_layer<S, W>(
    format: LogFormat,
    writer: W,
) -> tracing_subscriber::fmt::Layer<S, DefaultFields, RecordFormat, W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    tracing_subscriber::fmt::layer()
        .event_format(RecordFormat::new(format))
        .with_writer(writer)
}

type FilteredRegistry = Layered<reload::Layer<EnvFilter, Registry>, Registry>;
type OutputLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

struct ReloadHandles {
    filter: reload::Handle<EnvFilter, Registry>,
    output: reload::Handle<OutputLayer, FilteredRegistry>,
}

static INSTALLED: Mutex<Option<ReloadHandles>> = Mutex::new(None);

/// Configure process-wide logging, writing to stderr.
///
/// Returns the level actually applied.
pub fn configure_logging(level_name: &str, json: bool) -> Result<LogLevel, LoggingError> {
    configure_logging_with_writer(level_name, json, std::io::stderr)
}

/// Configure process-wide logging with an explicit destination.
///
/// The first call installs the global subscriber; later calls swap the filter
/// and the destination in place.
pub fn configure_logging_with_writer<W>(
    level_name: &str,
    json: bool,
    writer: W,
) -> Result<LogLevel, LoggingError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let (level, recognized) = LogLevel::resolve(level_name);
    let format = LogFormat::from_json_flag(json);
    let filter = level.filter()?;
    let output: OutputLayer = Box::new(output_layer(format, writer));

    {
        let mut installed = INSTALLED.lock().map_err(|_| LoggingError::Poisoned)?;
        match installed.as_ref() {
            Some(handles) => {
                handles.filter.reload(filter)?;
                handles.output.reload(output)?;
            }
            None => {
                let (filter_layer, filter_handle) = reload::Layer::new(filter);
                let (output_layer, output_handle) = reload::Layer::new(output);
                tracing_subscriber::registry()
                    .with(filter_layer)
                    .with(output_layer)
                    .try_init()?;
                *installed = Some(ReloadHandles {
                    filter: filter_handle,
                    output: output_handle,
                });
            }
        }
    }

    if !recognized {
        tracing::warn!("Unrecognized log level {:?}, falling back to {}", level_name, level);
    }
    tracing::info!("Logging configured - Level: {}, JSON: {}", level, json);
    Ok(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture(format: LogFormat, f: impl FnOnce()) -> String {
        let buffer = Capture::default();
        let writer = buffer.clone();
        let subscriber =
            tracing_subscriber::registry().with(output_layer(format, move || writer.clone()));
        tracing::subscriber::with_default(subscriber, f);
        buffer.contents()
    }

    #[test]
    fn test_level_parsing_is_case_insensitive() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("Warning".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("CRITICAL".parse::<LogLevel>().unwrap(), LogLevel::Critical);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        assert_eq!(LogLevel::resolve("loud"), (LogLevel::Info, false));
        assert_eq!(LogLevel::resolve("error"), (LogLevel::Error, true));
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Critical);
    }

    #[test]
    fn test_server_targets_never_below_warning() {
        assert_eq!(
            LogLevel::Debug.directives(),
            "debug,hyper=warn,tower_http::trace=warn"
        );
        assert_eq!(
            LogLevel::Critical.directives(),
            "error,hyper=error,tower_http::trace=error"
        );
        assert!(LogLevel::Info.filter().is_ok());
    }

    #[test]
    fn test_json_record_fields() {
        let out = capture(LogFormat::Json, || tracing::info!("x"));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 1);

        let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record["message"], "x");
        assert_eq!(record["level"], "INFO");
        assert_eq!(record["logger"], module_path!());
        assert_eq!(record["module"], module_path!());
        assert!(record["timestamp"].as_str().unwrap().ends_with('Z'));
        assert!(record["line"].as_u64().is_some());
        assert!(record.get("function").is_some());
        assert!(record.get("exception").is_none());
    }

    #[test]
    fn test_json_exception_only_with_failure_context() {
        let out = capture(LogFormat::Json, || {
            let span = tracing::info_span!("load_model");
            let _guard = span.enter();
            tracing::error!(exception = "boom\n  at handler", "Request failed");
        });
        let record: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(record["exception"], "boom\n  at handler");
        assert_eq!(record["function"], "load_model");
        assert_eq!(record["level"], "ERROR");
    }

    #[test]
    fn test_plain_layout() {
        let out = capture(LogFormat::Plain, || {
            tracing::warn!(attempt = 2, "retrying");
        });
        let line = out.trim_end();
        let parts: Vec<&str> = line.splitn(5, " - ").collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[1], module_path!());
        assert_eq!(parts[2], "WARNING");
        assert!(parts[3].starts_with(module_path!()));
        assert_eq!(parts[4], "retrying attempt=2");
    }
}
