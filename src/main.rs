use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use eyre::Context;
use lumber::{
    config::{self, EnvConfigProvider, JsonConfigProvider, LogSettings},
    context,
    logging::{self, Config, Destination, Level, Logger},
};

#[derive(Parser)]
#[command(version)]
#[command(about = "Writes a message at every level through the configured log destination.", long_about = None)]
struct Cli {
    #[arg(index = 1, default_value = "lumber smoke test")]
    message: String,

    #[arg(
        long,
        help = "JSON file with a `log` section. When it can't be read the LOG_LEVEL and LOG_FILE env vars are used."
    )]
    config: Option<PathBuf>,

    #[arg(long, help = "Overrides the configured threshold.")]
    level: Option<String>,

    #[arg(
        long,
        help = "Overrides the configured destination: a file path, a webhook URL or `stdout`."
    )]
    destination: Option<String>,

    #[arg(long, help = "Panics after logging, to check the panic hook.")]
    panic: bool,

    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        help = "Write internal diagnostics to stderr."
    )]
    verbose: u8,
}

impl Cli {
    fn setup_tracing(&self) {
        let level = match self.verbose {
            0 => return,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(level)
            .init();
    }

    fn settings(&self) -> LogSettings {
        let mut settings = match &self.config {
            Some(path) => config::resolve(&JsonConfigProvider::new(path)),
            None => config::resolve(&EnvConfigProvider::new()),
        };

        if let Some(level) = &self.level {
            settings.level = level.clone();
        }
        if let Some(destination) = &self.destination {
            settings.file = Some(destination.clone());
        }

        settings
    }

    fn run(self) -> eyre::Result<()> {
        self.setup_tracing();

        let settings = self.settings();
        let use_ansi = match Destination::classify(settings.file.as_deref()) {
            Destination::Stdout => std::io::stdout().is_terminal(),
            Destination::Fallback => std::io::stderr().is_terminal(),
            _ => false,
        };

        let logger = Logger::builder()
            .with_settings(settings)
            .with_config(Config {
                use_ansi,
                ..Config::new()
            })
            .build()
            .context("Failed initializing logger")?;
        let logger = Arc::new(logger);

        logging::install(logger.clone());
        logging::register_log_facade(logger.clone())?;

        tracing::debug!(target: "lumber", "threshold {}, destination {}", logger.threshold(), logger.destination().kind());

        for level in Level::MESSAGE_LEVELS {
            logger.write(level, &self.message, &context! { "rank" => level.rank() });
        }
        log::info!(target: "lumber", "log facade wired");

        if self.panic {
            panic!("panic requested from the command line");
        }

        logger.flush();
        Ok(())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.run() {
        Err(err) => {
            let root = err.root_cause();

            eprint!("\x1b[31m");
            eprintln!("Error: {}", err);
            eprintln!();
            eprintln!("Caused by:");
            eprint!("  {}", root);
            eprintln!("\x1b[0m");
            ExitCode::from(1)
        }
        Ok(_) => ExitCode::from(0),
    }
}
