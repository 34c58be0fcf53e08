use std::{
    error::Error,
    panic::{Location, PanicHookInfo},
    sync::Arc,
};

use eyre::Context as _;
use serde_json::Value;

use super::{Context, Logger};

/// Routes panics through `logger`.
///
/// The panic message is written at FATAL with the `file` and `line` of the
/// panic, then the process exits with status 1. Calling this again replaces
/// the previous hook.
pub fn install(logger: Arc<Logger>) {
    std::panic::set_hook(Box::new(move |info| {
        let (message, context) = panic_record(info);
        logger.fatal(message, &context);
        logger.flush();
        std::process::exit(1);
    }));
}

fn panic_record(info: &PanicHookInfo) -> (String, Context) {
    let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    };

    let mut context = Context::new();
    if let Some(location) = info.location() {
        context.insert("file".into(), location.file().into());
        context.insert("line".into(), location.line().into());
    }

    (message, context)
}

impl Logger {
    /// Reports a recoverable error at WARN with the caller's location.
    ///
    /// The context carries `errno` (the OS error code of an [`std::io::Error`],
    /// `null` otherwise), `file` and `line`. Execution continues normally.
    #[track_caller]
    pub fn report_error(&self, err: &(dyn Error + 'static)) {
        let location = Location::caller();
        let errno = err
            .downcast_ref::<std::io::Error>()
            .and_then(std::io::Error::raw_os_error)
            .map_or(Value::Null, Value::from);

        let mut context = Context::new();
        context.insert("errno".into(), errno);
        context.insert("file".into(), location.file().into());
        context.insert("line".into(), location.line().into());

        self.warn(err.to_string(), &context);
    }
}

/// Backs the `log` facade with `logger`.
///
/// Facade records keep their own level and carry the log target in the
/// context. Only the first registration in a process succeeds.
pub fn register_log_facade(logger: Arc<Logger>) -> eyre::Result<()> {
    log::set_max_level(logger.threshold().to_level_filter());
    log::set_boxed_logger(Box::new(Facade { logger }))
        .context("Failed registering boxed logger")?;

    Ok(())
}

struct Facade {
    logger: Arc<Logger>,
}

impl log::Log for Facade {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.logger.enabled(metadata.level().into())
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut context = Context::new();
        context.insert("target".into(), record.target().into());
        self.logger
            .write(record.level().into(), &record.args().to_string(), &context);
    }

    fn flush(&self) {
        self.logger.flush()
    }
}
