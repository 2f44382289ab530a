use anyhow::Context;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tailstat::cli::{Cli, Commands, ConfigAction};
use tailstat::config::Config;
use tailstat::display::DisplayMode;
use tailstat::error::{Result, TailstatError};
use tailstat::pipeline::Watcher;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Logs go to stderr so they never land inside the report
    init_logging(cli.verbose);

    match cli.command {
        Commands::Watch {
            log_file,
            debug,
            json,
        } => {
            cmd_watch(cli.config, log_file, debug, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "tailstat=debug" } else { "tailstat=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_watch(
    config_path: Option<PathBuf>,
    log_file: Option<PathBuf>,
    debug: bool,
    json: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;

    // Command-line flags win over the config file
    if let Some(path) = log_file {
        config.follow_file(path);
    }
    if debug {
        config.display.debug = true;
    }

    let mode = if json {
        DisplayMode::Json
    } else {
        DisplayMode::Report
    };
    let watcher = Watcher::new(&config, mode)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let result = runtime.block_on(watcher.run());

    // A pending stdin read would otherwise hold the runtime open
    runtime.shutdown_timeout(Duration::from_millis(200));

    result
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| TailstatError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };
            init_config(&path, force)?;
        }
    }

    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Configuration file already exists at: {}", path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TailstatError::Io {
            source: e,
            context: format!("Failed to create config directory: {:?}", parent),
        })?;
    }

    Config::default().save(path)?;
    println!("✓ Configuration initialized at: {}", path.display());

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'tailstat config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        return Ok(config);
    }

    Config::load(&path)
}
