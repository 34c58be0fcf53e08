use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};

use crate::{
    config::{self, ConfigProvider, EnvConfigProvider, LogSettings},
    error::LogError,
    http::{HyperTransport, WebhookTransport},
};

use super::{
    destination::{validate_destination, validate_level, Destination},
    formatters::DefaultFormatter,
    sinks::{FileSink, NullSink, StderrSink, StdoutSink, Stream, WebhookSink},
    Context, Diagnostics, Level, LogFormatter, LogRecord, LogSink,
};

/// Timestamp layout of formatted lines unless [`Config`] overrides it.
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct Config {
    pub datetime_format: String,
    pub use_ansi: bool,
}

impl Config {
    pub fn new() -> Self {
        Self {
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
            use_ansi: false,
        }
    }

    /// Rejects `datetime_format` values chrono cannot render.
    pub fn validate(&self) -> Result<(), LogError> {
        if StrftimeItems::new(&self.datetime_format).any(|item| matches!(item, Item::Error)) {
            return Err(LogError::InvalidTimestampFormat(
                self.datetime_format.clone(),
            ));
        }
        Ok(())
    }

    fn plain(&self) -> Self {
        Self {
            use_ansi: false,
            ..self.clone()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Validated threshold and destination of a [`Logger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub threshold: Level,
    pub destination: Destination,
}

impl Settings {
    /// Settings of a logger that emits nothing.
    pub fn disabled() -> Self {
        Self {
            threshold: Level::Off,
            destination: Destination::Fallback,
        }
    }

    pub fn from_raw(raw: &LogSettings) -> Result<Self, LogError> {
        let threshold = validate_level(&raw.level)?;
        let file = raw.file.as_deref();
        validate_destination(file)?;

        Ok(Self {
            threshold,
            destination: Destination::classify(file),
        })
    }
}

/// Leveled logger writing to a single destination.
///
/// Logging calls never fail: records below the threshold are dropped and
/// delivery failures are reported on the diagnostic stream (stderr unless
/// replaced through [`Builder::with_diagnostics`]).
pub struct Logger {
    settings: Settings,
    sink: Box<dyn LogSink>,
    diagnostics: Arc<dyn Diagnostics>,
    transport: Arc<dyn WebhookTransport>,
    streams: Streams,
    config: Config,
    fallback_formatter: DefaultFormatter,
}

/// Streams backing the stdout and fallback destinations.
#[derive(Clone)]
struct Streams {
    stdout: Stream,
    stderr: Stream,
}

impl Logger {
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Builds a logger from `provider`, falling back to `LOG_LEVEL` and
    /// `LOG_FILE` when the provider fails.
    pub fn init(provider: &dyn ConfigProvider) -> Result<Logger, LogError> {
        Self::init_with_fallback(provider, &EnvConfigProvider::new())
    }

    pub fn init_with_fallback(
        provider: &dyn ConfigProvider,
        fallback: &dyn ConfigProvider,
    ) -> Result<Logger, LogError> {
        Builder::new()
            .with_settings(config::resolve_with_fallback(provider, fallback))
            .build()
    }

    /// Resets the logger and resolves its settings again.
    ///
    /// On error the logger stays disabled until a later call succeeds.
    pub fn reinit(&mut self, provider: &dyn ConfigProvider) -> Result<(), LogError> {
        self.reinit_with_fallback(provider, &EnvConfigProvider::new())
    }

    pub fn reinit_with_fallback(
        &mut self,
        provider: &dyn ConfigProvider,
        fallback: &dyn ConfigProvider,
    ) -> Result<(), LogError> {
        self.sink.flush();
        self.settings = Settings::disabled();
        self.sink = Box::new(NullSink::new());

        let settings = Settings::from_raw(&config::resolve_with_fallback(provider, fallback))?;
        self.sink = build_sink(
            &settings.destination,
            &self.config,
            &self.transport,
            &self.streams,
        );
        self.settings = settings;

        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn threshold(&self) -> Level {
        self.settings.threshold
    }

    pub fn destination(&self) -> &Destination {
        &self.settings.destination
    }

    /// Whether a record at `level` would be handed to the sink.
    pub fn enabled(&self, level: Level) -> bool {
        level != Level::Off && self.settings.threshold <= level
    }

    /// Writes a record if `level` meets the threshold.
    ///
    /// Delivery failures are reported on the diagnostic stream.
    pub fn write(&self, level: Level, message: &str, context: &Context) {
        let record = LogRecord::new(level, message, context);

        if let Err(err) = self.dispatch(&record) {
            self.report(&record, &err);
        }
    }

    /// Same as [`Logger::write`] but hands the delivery result back
    /// instead of reporting it.
    pub fn try_write(&self, level: Level, message: &str, context: &Context) -> Result<(), LogError> {
        self.dispatch(&LogRecord::new(level, message, context))
    }

    /// Writes at a level given by name. Unknown names are an error, delivery
    /// failures are not.
    pub fn log(&self, level: &str, message: &str, context: &Context) -> Result<(), LogError> {
        let level = validate_level(level)?;
        self.write(level, message, context);
        Ok(())
    }

    pub fn flush(&self) {
        self.sink.flush();
    }

    fn dispatch(&self, record: &LogRecord) -> Result<(), LogError> {
        if !self.enabled(record.level) {
            return Ok(());
        }

        self.sink.write_log(record)
    }

    fn report(&self, record: &LogRecord, err: &LogError) {
        let reason = match err {
            LogError::Delivery { sink, reason } => format!(
                "failed delivering {} record to {}: {}",
                record.level, sink, reason
            ),
            other => other.to_string(),
        };

        self.diagnostics.report(&format!("lumber: {}", reason));
        self.diagnostics.report(&self.fallback_formatter.format(record));
    }

    pub fn trace(&self, message: impl AsRef<str>, context: &Context) {
        self.write(Level::Trace, message.as_ref(), context)
    }

    pub fn debug(&self, message: impl AsRef<str>, context: &Context) {
        self.write(Level::Debug, message.as_ref(), context)
    }

    pub fn info(&self, message: impl AsRef<str>, context: &Context) {
        self.write(Level::Info, message.as_ref(), context)
    }

    pub fn notice(&self, message: impl AsRef<str>, context: &Context) {
        self.write(Level::Notice, message.as_ref(), context)
    }

    pub fn warn(&self, message: impl AsRef<str>, context: &Context) {
        self.write(Level::Warn, message.as_ref(), context)
    }

    pub fn error(&self, message: impl AsRef<str>, context: &Context) {
        self.write(Level::Error, message.as_ref(), context)
    }

    pub fn critical(&self, message: impl AsRef<str>, context: &Context) {
        self.write(Level::Critical, message.as_ref(), context)
    }

    pub fn alert(&self, message: impl AsRef<str>, context: &Context) {
        self.write(Level::Alert, message.as_ref(), context)
    }

    pub fn emergency(&self, message: impl AsRef<str>, context: &Context) {
        self.write(Level::Emergency, message.as_ref(), context)
    }

    pub fn fatal(&self, message: impl AsRef<str>, context: &Context) {
        self.write(Level::Fatal, message.as_ref(), context)
    }
}

fn build_sink(
    destination: &Destination,
    config: &Config,
    transport: &Arc<dyn WebhookTransport>,
    streams: &Streams,
) -> Box<dyn LogSink> {
    let formatter = |config: Config| -> Box<dyn LogFormatter> {
        Box::new(DefaultFormatter::new(config))
    };

    match destination {
        Destination::File(path) => {
            Box::new(FileSink::new(path.clone(), formatter(config.plain())))
        }
        Destination::Webhook(url) => Box::new(WebhookSink::new(url.clone(), transport.clone())),
        Destination::Stdout => Box::new(StdoutSink::with_stream(
            streams.stdout.clone(),
            formatter(config.clone()),
        )),
        Destination::Fallback => Box::new(StderrSink::with_stream(
            streams.stderr.clone(),
            formatter(config.clone()),
        )),
    }
}

pub struct Builder {
    settings: LogSettings,
    transport: Option<Arc<dyn WebhookTransport>>,
    diagnostics: Option<Arc<dyn Diagnostics>>,
    streams: Streams,
    config: Config,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            settings: LogSettings::default(),
            transport: None,
            diagnostics: None,
            streams: Streams {
                stdout: Stream::Stdout,
                stderr: Stream::Stderr,
            },
            config: Config::new(),
        }
    }

    pub fn with_settings(self, settings: LogSettings) -> Self {
        Self { settings, ..self }
    }

    pub fn with_level(self, level: Level) -> Self {
        Self {
            settings: LogSettings {
                level: level.as_str().to_string(),
                ..self.settings
            },
            ..self
        }
    }

    /// File path, webhook URL or [`super::STDOUT_SENTINEL`]; empty means stderr.
    pub fn with_destination(self, destination: impl Into<String>) -> Self {
        let destination: String = destination.into();
        Self {
            settings: LogSettings {
                file: Some(destination).filter(|d| !d.is_empty()),
                ..self.settings
            },
            ..self
        }
    }

    pub fn with_transport(self, transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            transport: Some(transport),
            ..self
        }
    }

    pub fn with_diagnostics(self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            diagnostics: Some(diagnostics),
            ..self
        }
    }

    pub fn with_config(self, config: Config) -> Self {
        Self { config, ..self }
    }

    /// Stream used by the [`super::STDOUT_SENTINEL`] destination.
    pub fn with_stdout(self, stdout: Stream) -> Self {
        Self {
            streams: Streams {
                stdout,
                ..self.streams
            },
            ..self
        }
    }

    /// Stream used by the fallback destination and, unless
    /// [`Builder::with_diagnostics`] is set, for delivery failure reports.
    pub fn with_stderr(self, stderr: Stream) -> Self {
        Self {
            streams: Streams {
                stderr,
                ..self.streams
            },
            ..self
        }
    }

    pub fn build(self) -> Result<Logger, LogError> {
        self.config.validate()?;
        let settings = Settings::from_raw(&self.settings.clone().normalized())?;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HyperTransport::new()));
        let diagnostics = self.diagnostics.unwrap_or_else(|| {
            Arc::new(StderrSink::with_stream(
                self.streams.stderr.clone(),
                Box::new(DefaultFormatter::new(self.config.plain())),
            ))
        });
        let sink = build_sink(
            &settings.destination,
            &self.config,
            &transport,
            &self.streams,
        );

        Ok(Logger {
            settings,
            sink,
            diagnostics,
            transport,
            streams: self.streams,
            fallback_formatter: DefaultFormatter::new(self.config.plain()),
            config: self.config,
        })
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use super::*;
    use crate::{
        config::{EnvConfigProvider, LOG_FILE, LOG_LEVEL},
        logging::testing::{MemorySink, RecordingTransport, SharedBuffer},
    };

    const HOOK: &str = "https://hooks.example/T0/B0";

    fn webhook_logger(level: Level, transport: Arc<RecordingTransport>) -> Logger {
        Logger::builder()
            .with_level(level)
            .with_destination(HOOK)
            .with_transport(transport)
            .build()
            .unwrap()
    }

    fn env(level: &str, file: &str) -> EnvConfigProvider {
        let (level, file) = (level.to_string(), file.to_string());
        EnvConfigProvider::with_lookup(move |key| match key {
            LOG_LEVEL => Some(level.clone()),
            LOG_FILE => Some(file.clone()),
            _ => None,
        })
    }

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lumber-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn emit_all(logger: &Logger) {
        let context = Context::new();
        logger.trace("m", &context);
        logger.debug("m", &context);
        logger.info("m", &context);
        logger.notice("m", &context);
        logger.warn("m", &context);
        logger.error("m", &context);
        logger.critical("m", &context);
        logger.alert("m", &context);
        logger.emergency("m", &context);
        logger.fatal("m", &context);
    }

    fn posted_levels(transport: &RecordingTransport) -> Vec<String> {
        transport
            .posts()
            .iter()
            .map(|(_, payload)| {
                let title = payload["embeds"][0]["title"].as_str().unwrap();
                title.rsplit(' ').next().unwrap().to_string()
            })
            .collect()
    }

    #[test]
    fn threshold_filters_lower_levels() {
        let transport = Arc::new(RecordingTransport::succeeding());
        let logger = webhook_logger(Level::Warn, transport.clone());

        emit_all(&logger);

        assert_eq!(
            posted_levels(&transport),
            [
                "[WARN]",
                "[ERROR]",
                "[CRITICAL]",
                "[ALERT]",
                "[EMERGENCY]",
                "[FATAL]"
            ]
        );
    }

    #[test]
    fn off_threshold_emits_nothing() {
        let transport = Arc::new(RecordingTransport::succeeding());
        let logger = webhook_logger(Level::Off, transport.clone());

        emit_all(&logger);
        logger.write(Level::Off, "never", &Context::new());

        assert!(transport.posts().is_empty());
    }

    #[test]
    fn trace_threshold_emits_everything() {
        let transport = Arc::new(RecordingTransport::succeeding());
        let logger = webhook_logger(Level::Trace, transport.clone());

        emit_all(&logger);

        assert_eq!(transport.posts().len(), 10);
    }

    #[test]
    fn default_builder_is_disabled() {
        let logger = Logger::builder().build().unwrap();

        assert_eq!(logger.settings(), &Settings::disabled());
        assert!(!logger.enabled(Level::Fatal));
    }

    #[test]
    fn webhook_failure_goes_to_diagnostics() {
        let transport = Arc::new(RecordingTransport::failing("webhook responded with status 429"));
        let diagnostics = MemorySink::new();
        let logger = Logger::builder()
            .with_level(Level::Info)
            .with_destination(HOOK)
            .with_transport(transport.clone())
            .with_diagnostics(Arc::new(diagnostics.clone()))
            .build()
            .unwrap();

        logger.error("payment failed", &crate::context! { "order" => 12 });

        let lines = diagnostics.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "lumber: failed delivering ERROR record to webhook: webhook responded with status 429"
        );
        assert!(lines[1].ends_with(r#"[ERROR] payment failed {"order":12}"#));
    }

    #[test]
    fn try_write_exposes_delivery_result() {
        let transport = Arc::new(RecordingTransport::failing("boom"));
        let logger = webhook_logger(Level::Info, transport);
        let context = Context::new();

        assert!(matches!(
            logger.try_write(Level::Error, "m", &context),
            Err(LogError::Delivery { sink: "webhook", .. })
        ));
        assert!(logger.try_write(Level::Debug, "m", &context).is_ok());
    }

    #[test]
    fn webhook_fields_follow_context_order() {
        let transport = Arc::new(RecordingTransport::succeeding());
        let logger = webhook_logger(Level::Info, transport.clone());

        logger.info(
            "deploy",
            &crate::context! { "service" => "api", "version" => "1.4.2", "canary" => false },
        );

        let posts = transport.posts();
        let names: Vec<&str> = posts[0].1["embeds"][0]["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|field| field["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["service", "version", "canary"]);
    }

    #[test]
    fn log_by_name_rejects_unknown_levels() {
        let transport = Arc::new(RecordingTransport::succeeding());
        let logger = webhook_logger(Level::Trace, transport.clone());
        let context = Context::new();

        assert!(matches!(
            logger.log("WARNING", "m", &context),
            Err(LogError::InvalidLevel(_))
        ));
        logger.log("warn", "m", &context).unwrap();

        assert_eq!(posted_levels(&transport), ["[WARN]"]);
    }

    #[test]
    fn file_destination_appends_lines() {
        let dir = scratch_dir();
        let path = dir.join("app.log");
        let logger = Logger::builder()
            .with_level(Level::Info)
            .with_destination(path.to_str().unwrap())
            .build()
            .unwrap();

        logger.info("hello", &Context::new());
        logger.info("hello", &Context::new());
        logger.debug("filtered", &Context::new());

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|line| line.ends_with("[INFO] hello {}")));
        assert!(contents.ends_with('\n'));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn file_write_failure_is_contained() {
        let dir = scratch_dir();
        let path = dir.join("app.log");
        let diagnostics = MemorySink::new();
        let logger = Logger::builder()
            .with_level(Level::Info)
            .with_destination(path.to_str().unwrap())
            .with_diagnostics(Arc::new(diagnostics.clone()))
            .build()
            .unwrap();

        fs::remove_dir_all(&dir).unwrap();
        logger.error("disk gone", &Context::new());

        let lines = diagnostics.lines();
        assert!(lines[0].starts_with("lumber: failed delivering ERROR record to file:"));
        assert!(lines[1].ends_with("[ERROR] disk gone {}"));
    }

    #[test]
    fn init_rejects_missing_parent_directory() {
        let dir = scratch_dir();
        let path = dir.join("missing").join("app.log");
        let result = Logger::init_with_fallback(
            &env("info", path.to_str().unwrap()),
            &EnvConfigProvider::with_lookup(|_| None),
        );
        fs::remove_dir_all(dir).unwrap();

        assert!(matches!(result, Err(LogError::InvalidDestination { .. })));
    }

    #[test]
    fn init_rejects_unknown_level() {
        let result = Logger::init(&env("verbose", ""));

        assert!(matches!(result, Err(LogError::InvalidLevel(_))));
    }

    #[test]
    fn init_classifies_destinations() {
        let cases = [
            ("https://x/y", Destination::Webhook("https://x/y".into())),
            ("http://x", Destination::Webhook("http://x".into())),
            ("stdout", Destination::Stdout),
            ("", Destination::Fallback),
        ];

        for (raw, expected) in cases {
            let logger = Logger::init(&env("info", raw)).unwrap();
            assert_eq!(logger.destination(), &expected);
            assert_eq!(logger.threshold(), Level::Info);
        }
    }

    #[test]
    fn reinit_resets_and_reresolves() {
        let dir = scratch_dir();
        let path = dir.join("app.log");
        let mut logger = Logger::init(&env("error", "stdout")).unwrap();

        logger.reinit(&env("debug", path.to_str().unwrap())).unwrap();
        assert_eq!(logger.threshold(), Level::Debug);
        assert_eq!(logger.destination(), &Destination::File(path.clone()));

        logger.debug("after reinit", &Context::new());
        assert!(fs::read_to_string(&path).unwrap().contains("after reinit"));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn failed_reinit_leaves_logger_disabled() {
        let mut logger = Logger::init(&env("trace", "stdout")).unwrap();
        let dir = scratch_dir();
        let missing = dir.join("missing").join("app.log");

        let result = logger.reinit(&env("trace", missing.to_str().unwrap()));
        fs::remove_dir_all(dir).unwrap();

        assert!(matches!(result, Err(LogError::InvalidDestination { .. })));
        assert_eq!(logger.settings(), &Settings::disabled());
        assert!(!logger.enabled(Level::Fatal));
    }

    fn assert_single_line(output: &str, suffix: &str) {
        assert_eq!(output.matches('\n').count(), 1, "{:?}", output);
        assert!(output.ends_with(suffix), "{:?}", output);
        let (timestamp, _) = output.split_at(19);
        chrono::NaiveDateTime::parse_from_str(timestamp, DEFAULT_DATETIME_FORMAT).unwrap();
    }

    #[test]
    fn stdout_destination_writes_to_stdout_stream() {
        let (stdout, stderr) = (SharedBuffer::default(), SharedBuffer::default());
        let logger = Logger::builder()
            .with_level(Level::Info)
            .with_destination(crate::logging::STDOUT_SENTINEL)
            .with_stdout(Stream::writer(stdout.clone()))
            .with_stderr(Stream::writer(stderr.clone()))
            .build()
            .unwrap();

        logger.debug("filtered", &Context::new());
        logger.info("hello", &Context::new());

        assert_single_line(&stdout.contents(), " [INFO] hello {}\n");
        assert_eq!(stderr.contents(), "");
    }

    #[test]
    fn empty_destination_writes_to_stderr_stream() {
        let (stdout, stderr) = (SharedBuffer::default(), SharedBuffer::default());
        let logger = Logger::builder()
            .with_level(Level::Info)
            .with_stdout(Stream::writer(stdout.clone()))
            .with_stderr(Stream::writer(stderr.clone()))
            .build()
            .unwrap();

        logger.info("hello", &Context::new());

        assert_eq!(logger.destination(), &Destination::Fallback);
        assert_single_line(&stderr.contents(), " [INFO] hello {}\n");
        assert_eq!(stdout.contents(), "");
    }

    #[test]
    fn default_diagnostics_use_stderr_stream() {
        let stderr = SharedBuffer::default();
        let logger = Logger::builder()
            .with_level(Level::Info)
            .with_destination(HOOK)
            .with_transport(Arc::new(RecordingTransport::failing("status 404")))
            .with_stderr(Stream::writer(stderr.clone()))
            .build()
            .unwrap();

        logger.error("lost", &Context::new());

        let output = stderr.contents();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "lumber: failed delivering ERROR record to webhook: status 404"
        );
        assert!(lines[1].ends_with("[ERROR] lost {}"));
    }

    #[test]
    fn reinit_keeps_injected_streams() {
        let stdout = SharedBuffer::default();
        let mut logger = Logger::builder()
            .with_level(Level::Error)
            .with_stdout(Stream::writer(stdout.clone()))
            .with_stderr(Stream::writer(SharedBuffer::default()))
            .build()
            .unwrap();

        logger.reinit(&env("notice", "stdout")).unwrap();
        logger.notice("moved", &Context::new());

        assert_single_line(&stdout.contents(), " [NOTICE] moved {}\n");
    }

    #[test]
    fn build_rejects_unrenderable_timestamp_format() {
        let result = Logger::builder()
            .with_level(Level::Info)
            .with_destination("stdout")
            .with_config(Config {
                datetime_format: "%Y-%m-%d %Q".to_string(),
                ..Config::new()
            })
            .build();

        match result {
            Err(LogError::InvalidTimestampFormat(format)) => assert_eq!(format, "%Y-%m-%d %Q"),
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("build accepted an unrenderable timestamp format"),
        }
    }

    #[test]
    fn build_accepts_custom_timestamp_format() {
        let config = Config {
            datetime_format: "%H:%M:%S%.3f".to_string(),
            ..Config::new()
        };

        assert!(config.validate().is_ok());
        assert!(Config::new().validate().is_ok());
    }
}
