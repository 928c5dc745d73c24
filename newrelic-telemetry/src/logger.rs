//! Forwarding of `log` records to the Log API.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use newrelic_telemetry::{LogBatch, TelemetryLogger};
//!
//! let batch = Arc::new(LogBatch::new());
//! let mut log_builder = pretty_env_logger::formatted_builder();
//! log_builder.parse_filters("info");
//! TelemetryLogger::new(batch.clone())
//!     .filter(log::LevelFilter::Info)
//!     .with_dest_log(log_builder.build())
//!     .install()
//!     .unwrap();
//!
//! log::info!(user_id = 42; "Recorded and printed");
//! assert_eq!(batch.len(), 1);
//! ```
//!
//! Printing records as New Relic JSON lines instead:
//!
//! ```no_run
//! use std::io::Write;
//!
//! pretty_env_logger::formatted_builder()
//!     .format(|buf, record| writeln!(buf, "{}", newrelic_telemetry::format_record(record)))
//!     .init();
//! ```

use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

use log::kv::{self, VisitSource};
use log::LevelFilter;
use serde_json::{Map, Value};

use newrelic_telemetry_core::LogBatch;
use newrelic_telemetry_types::utils::datetime_to_millis;
use newrelic_telemetry_types::{AttributeValue, Attributes, Log};

/// Records from these targets are never captured, as sending telemetry
/// would produce more of them.
const IGNORED_TARGETS: &[&str] = &["newrelic_telemetry", "reqwest", "hyper"];

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|prefix| target.starts_with(prefix))
}

struct KeyValues<'a>(&'a mut Attributes);

impl<'kvs> VisitSource<'kvs> for KeyValues<'_> {
    fn visit_pair(
        &mut self,
        key: kv::Key<'kvs>,
        value: kv::Value<'kvs>,
    ) -> Result<(), kv::Error> {
        self.0.insert(key.as_str().to_owned(), attribute_value(&value));
        Ok(())
    }
}

/// Scalars keep their type, anything else is rendered as a string.
fn attribute_value(value: &kv::Value<'_>) -> AttributeValue {
    if let Some(b) = value.to_bool() {
        AttributeValue::Bool(b)
    } else if let Some(i) = value.to_i64() {
        AttributeValue::Int(i)
    } else if let Some(u) = value.to_u64() {
        AttributeValue::UInt(u)
    } else if let Some(f) = value.to_f64().filter(|f| f.is_finite()) {
        AttributeValue::Float(f)
    } else if let Some(s) = value.to_borrowed_str() {
        AttributeValue::String(s.to_owned())
    } else {
        AttributeValue::String(value.to_string())
    }
}

fn record_attributes(record: &log::Record<'_>) -> Attributes {
    let current = thread::current();
    let mut attributes = Attributes::new();
    attributes.insert("log.level".into(), record.level().as_str().into());
    attributes.insert("logger.name".into(), record.target().into());
    attributes.insert("thread.id".into(), format!("{:?}", current.id()).into());
    if let Some(name) = current.name() {
        attributes.insert("thread.name".into(), name.into());
    }
    attributes.insert("process.id".into(), std::process::id().into());
    if let Some(file) = record.file() {
        attributes.insert("file.name".into(), file.into());
    }
    if let Some(line) = record.line() {
        attributes.insert("line.number".into(), line.into());
    }
    if let Some(module) = record.module_path() {
        attributes.insert("module.path".into(), module.into());
    }
    // visiting into a map never fails
    let _ = record.key_values().visit(&mut KeyValues(&mut attributes));
    attributes
}

/// Creates a [`Log`] from a given [`log::Record`].
///
/// Structured key-values of the record become attributes and override the
/// standard ones on a name clash.
pub fn log_from_record(record: &log::Record<'_>) -> Log {
    Log::new(record.args().to_string())
        .with_timestamp(SystemTime::now())
        .with_attributes(record_attributes(record))
}

/// Renders a record as a single line of New Relic log JSON.
///
/// The object holds `timestamp` (unix milliseconds), `message` and every
/// attribute [`log_from_record`] collects, flattened to the top level.
pub fn format_record(record: &log::Record<'_>) -> String {
    let log = log_from_record(record);
    let mut object = Map::new();
    object.insert("timestamp".into(), datetime_to_millis(&log.timestamp).into());
    object.insert("message".into(), log.message.into());
    for (key, value) in log.attributes {
        object.insert(key, serde_json::to_value(value).unwrap_or_default());
    }
    Value::Object(object).to_string()
}

/// A [`log::Log`] implementation that records into a [`LogBatch`].
///
/// Records at or above the filter level are turned into [`Log`]s.  A
/// destination logger may be given to keep printing records as well.
pub struct TelemetryLogger {
    batch: Arc<LogBatch>,
    filter: LevelFilter,
    dest_log: Option<Box<dyn log::Log>>,
}

impl TelemetryLogger {
    /// Creates a logger capturing `Info` and above into `batch`.
    pub fn new(batch: Arc<LogBatch>) -> Self {
        TelemetryLogger {
            batch,
            filter: LevelFilter::Info,
            dest_log: None,
        }
    }

    /// Sets the level records are captured at.
    #[must_use]
    pub fn filter(mut self, filter: LevelFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Forwards every record to `dest_log` as well.
    #[must_use]
    pub fn with_dest_log<L: log::Log + 'static>(mut self, dest_log: L) -> Self {
        self.dest_log = Some(Box::new(dest_log));
        self
    }

    /// Installs this logger as the global `log` logger.
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        let max_level = if self.dest_log.is_some() {
            LevelFilter::Trace
        } else {
            self.filter
        };
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(max_level);
        Ok(())
    }

    fn captures(&self, md: &log::Metadata<'_>) -> bool {
        md.level() <= self.filter && !is_ignored(md.target())
    }
}

impl log::Log for TelemetryLogger {
    fn enabled(&self, md: &log::Metadata<'_>) -> bool {
        self.captures(md) || self.dest_log.as_ref().is_some_and(|x| x.enabled(md))
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.captures(record.metadata()) {
            // a full batch drops the record, there is nowhere to report it
            let _ = self.batch.record(log_from_record(record));
        }
        if let Some(ref log) = self.dest_log {
            if log.enabled(record.metadata()) {
                log.log(record);
            }
        }
    }

    fn flush(&self) {
        if let Some(ref log) = self.dest_log {
            log.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use log::{Level, Log as _, Record};
    use newrelic_telemetry_types::AttributeValue;

    use super::*;

    #[test]
    fn test_log_from_record() {
        let log = log_from_record(
            &Record::builder()
                .args(format_args!("Hello {}", "World"))
                .level(Level::Warn)
                .target("my_app::jobs")
                .file(Some("src/jobs.rs"))
                .line(Some(42))
                .module_path(Some("my_app::jobs"))
                .build(),
        );
        assert_eq!(log.message, "Hello World");
        assert_eq!(log.level(), Some("WARN"));
        let attr = |key: &str| log.attributes.get(key).cloned();
        assert_eq!(attr("logger.name"), Some("my_app::jobs".into()));
        assert_eq!(attr("file.name"), Some("src/jobs.rs".into()));
        assert_eq!(attr("line.number"), Some(AttributeValue::UInt(42)));
        assert_eq!(attr("module.path"), Some("my_app::jobs".into()));
        assert!(attr("thread.id").is_some());
    }

    #[test]
    fn test_process_id() {
        let log = log_from_record(&Record::builder().args(format_args!("pid")).build());
        assert_eq!(
            log.attributes.get("process.id"),
            Some(&AttributeValue::UInt(u64::from(std::process::id())))
        );
    }

    #[test]
    fn test_key_values_become_attributes() {
        let kvs: Vec<(&str, kv::Value<'_>)> = vec![
            ("user.id", 42u64.into()),
            ("balance", (-7i64).into()),
            ("ratio", 0.5f64.into()),
            ("retry", true.into()),
            ("cart", "abc-123".into()),
            ("logger.name", "overridden".into()),
        ];
        let log = log_from_record(
            &Record::builder()
                .args(format_args!("checkout"))
                .target("shop")
                .key_values(&kvs)
                .build(),
        );
        let attr = |key: &str| log.attributes.get(key).cloned();
        assert_eq!(attr("user.id"), Some(AttributeValue::Int(42)));
        assert_eq!(attr("balance"), Some(AttributeValue::Int(-7)));
        assert_eq!(attr("ratio"), Some(AttributeValue::Float(0.5)));
        assert_eq!(attr("retry"), Some(AttributeValue::Bool(true)));
        assert_eq!(attr("cart"), Some("abc-123".into()));
        assert_eq!(attr("logger.name"), Some("overridden".into()));
    }

    #[test]
    fn test_format_record() {
        let kvs = vec![("request.id", kv::Value::from("r-1"))];
        let line = format_record(
            &Record::builder()
                .args(format_args!("Hello World"))
                .level(Level::Error)
                .target("my_app")
                .line(Some(7))
                .key_values(&kvs)
                .build(),
        );
        assert!(!line.contains('\n'));
        assert!(!line.contains(": "));

        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["message"], "Hello World");
        assert_eq!(json["log.level"], "ERROR");
        assert_eq!(json["logger.name"], "my_app");
        assert_eq!(json["line.number"], 7);
        assert_eq!(json["process.id"], std::process::id());
        assert_eq!(json["request.id"], "r-1");
        assert!(json["timestamp"].as_u64().unwrap() > 1_600_000_000_000);
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl log::Log for Recorder {
        fn enabled(&self, _: &log::Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &log::Record<'_>) {
            self.0.lock().unwrap().push(record.args().to_string());
        }

        fn flush(&self) {}
    }

    fn emit(logger: &TelemetryLogger, level: Level, target: &str, msg: &str) {
        logger.log(
            &Record::builder()
                .args(format_args!("{msg}"))
                .level(level)
                .target(target)
                .build(),
        );
    }

    #[test]
    fn test_filter_and_forwarding() {
        let batch = Arc::new(LogBatch::new());
        let recorder = Recorder::default();
        let logger = TelemetryLogger::new(batch.clone())
            .filter(LevelFilter::Warn)
            .with_dest_log(recorder.clone());

        emit(&logger, Level::Error, "app", "captured");
        emit(&logger, Level::Info, "app", "below filter");
        emit(&logger, Level::Error, "newrelic_telemetry::client", "internal");

        let messages: Vec<_> = batch
            .flush()
            .into_items()
            .into_iter()
            .map(|l| l.message)
            .collect();
        assert_eq!(messages, ["captured"]);
        assert_eq!(
            *recorder.0.lock().unwrap(),
            ["captured", "below filter", "internal"]
        );
    }

    fn md(level: Level, target: &str) -> log::Metadata<'_> {
        log::Metadata::builder().level(level).target(target).build()
    }

    #[test]
    fn test_enabled() {
        let logger = TelemetryLogger::new(Arc::new(LogBatch::new()));
        assert!(logger.enabled(&md(Level::Info, "app")));
        assert!(!logger.enabled(&md(Level::Debug, "app")));
        assert!(!logger.enabled(&md(Level::Error, "reqwest::connect")));
    }
}
