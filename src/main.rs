// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lingosub::app_config::{Config, LogLevel};
use lingosub::app_controller::Controller;
use lingosub::translation::TerminologyMap;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

fn level_filter(level: &LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error => LevelFilter::Error,
        LogLevel::Warn => LevelFilter::Warn,
        LogLevel::Info => LevelFilter::Info,
        LogLevel::Debug => LevelFilter::Debug,
        LogLevel::Trace => LevelFilter::Trace,
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate subtitle files (default command)
    #[command(alias = "translate")]
    Translate(TranslateArgs),

    /// Manage the custom terminology list
    Terminology {
        #[command(subcommand)]
        action: TerminologyCommands,
    },

    /// Probe the configured API endpoint with a one-word request
    TestConnection {
        /// Configuration file path
        #[arg(short, long, default_value = "conf.json")]
        config_path: String,
    },

    /// Generate shell completions for lingosub
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum TerminologyCommands {
    /// Merge terms from a JSON or CSV file into the config
    Import {
        /// Terminology file (.json or .csv)
        file: PathBuf,

        /// Configuration file path
        #[arg(short, long, default_value = "conf.json")]
        config_path: String,
    },

    /// Write the configured terms to a JSON or CSV file
    Export {
        /// Destination file (.json or .csv)
        file: PathBuf,

        /// Configuration file path
        #[arg(short, long, default_value = "conf.json")]
        config_path: String,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Input subtitle file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Output file path (defaults to <input>.<target-language>.srt)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Resume from a checkpoint file left by an interrupted run
    #[arg(short, long)]
    resume: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Source language code (e.g., 'en', 'ja', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'zh', 'en', 'es')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Use the three-phase pipeline (draft, terminology, refine)
    #[arg(long)]
    multi_phase: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// LingoSub - AI subtitle translation
///
/// Translates SRT subtitle files through any OpenAI-compatible chat
/// endpoint, with Netflix-style segmentation, terminology consistency
/// and crash-safe checkpointing.
#[derive(Parser, Debug)]
#[command(name = "lingosub")]
#[command(version = "1.0.0")]
#[command(about = "AI-powered subtitle translation tool")]
#[command(long_about = "LingoSub translates SRT subtitle files using an OpenAI-compatible API.

EXAMPLES:
    lingosub movie.srt                          # Translate using default config
    lingosub -f movie.srt                       # Force overwrite existing output
    lingosub -s en -t zh movie.srt              # Translate from English to Chinese
    lingosub --multi-phase movie.srt            # Draft, terminology and refinement passes
    lingosub -r .temp_translations_1700000000.json movie.srt
                                                # Resume an interrupted run
    lingosub terminology import terms.csv       # Merge custom terms into the config
    lingosub test-connection                    # Check API host, key and model
    lingosub completions bash > lingosub.bash   # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a
    different file with --config-path. Without a local conf.json the
    per-user config directory is used instead, and a default file is
    created automatically when none exists.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    translate: TranslateArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }

    // @returns: Emoji for log level
    fn emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                Self::emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default;
    // the level is updated after the config is loaded.
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "lingosub", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::TestConnection { config_path }) => {
            let config = load_config(&config_path)?;
            log::set_max_level(level_filter(&config.log_level));
            let controller = Controller::with_config(config)?;
            controller.test_connection().await
        }
        Some(Commands::Terminology { action }) => run_terminology(action),
        Some(Commands::Translate(args)) => run_translate(args).await,
        None => run_translate(cli.translate).await,
    }
}

fn load_config(config_path: &str) -> Result<Config> {
    let path = Path::new(config_path);
    // With the stock path and no conf.json in the working directory,
    // fall back to the per-user config location.
    if config_path == "conf.json" && !path.exists() {
        return Config::load_or_create(&Config::default_path());
    }
    Config::load_or_create(path)
}

async fn run_translate(options: TranslateArgs) -> Result<()> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &options.log_level {
        let config_log_level: LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level_filter(&config_log_level));
    }

    let input_path = options
        .input_path
        .ok_or_else(|| anyhow!("INPUT_PATH is required when no subcommand is specified"))?;

    let mut config = load_config(&options.config_path)?;

    // Override config with CLI options if provided
    if let Some(model) = &options.model {
        config.model = model.clone();
    }
    if let Some(source_lang) = &options.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }
    if options.multi_phase {
        config.translation.multi_phase = true;
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;

    if options.log_level.is_none() {
        log::set_max_level(level_filter(&config.log_level));
    }

    let controller = Arc::new(Controller::with_config(config)?);

    // First Ctrl-C requests a graceful stop at the next batch
    // boundary; the checkpoint makes a hard kill recoverable anyway.
    {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current batch");
                controller.request_stop();
            }
        });
    }

    if input_path.is_file() {
        controller
            .run(
                input_path,
                options.output,
                options.resume,
                options.force_overwrite,
            )
            .await?;
    } else if input_path.is_dir() {
        if options.output.is_some() || options.resume.is_some() {
            return Err(anyhow!(
                "--output and --resume only apply to single-file translation"
            ));
        }
        controller
            .run_folder(input_path, options.force_overwrite)
            .await?;
    } else {
        return Err(anyhow!("Input path does not exist: {:?}", input_path));
    }

    Ok(())
}

fn run_terminology(action: TerminologyCommands) -> Result<()> {
    match action {
        TerminologyCommands::Import { file, config_path } => {
            let mut config = load_config(&config_path)?;
            let imported = load_terminology_file(&file)?;
            if imported.is_empty() {
                warn!("No terms found in {}", file.display());
                return Ok(());
            }

            let before = config.custom_terminology.len();
            for (source, target) in imported.iter() {
                config
                    .custom_terminology
                    .insert(source.to_string(), target.to_string());
            }
            config.save(Path::new(&config_path))?;
            info!(
                "Imported {} terms ({} total, was {})",
                imported.len(),
                config.custom_terminology.len(),
                before
            );
            Ok(())
        }
        TerminologyCommands::Export { file, config_path } => {
            let config = load_config(&config_path)?;
            if config.custom_terminology.is_empty() {
                warn!("No custom terms configured, nothing to export");
                return Ok(());
            }

            let terms: TerminologyMap = config
                .custom_terminology
                .iter()
                .map(|(source, target)| (source.clone(), target.clone()))
                .collect();
            if is_csv(&file) {
                terms.save_csv(&file)?;
            } else {
                terms.save_json(&file)?;
            }
            info!("Exported {} terms to {}", terms.len(), file.display());
            Ok(())
        }
    }
}

fn load_terminology_file(file: &Path) -> Result<TerminologyMap> {
    if !file.exists() {
        return Err(anyhow!("Terminology file does not exist: {:?}", file));
    }
    if is_csv(file) {
        TerminologyMap::load_csv(file)
    } else {
        TerminologyMap::load_json(file)
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}
