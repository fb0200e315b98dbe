//! `c8yctrl`: record/replay proxy for Cumulocity.
//!
//! Settings come from an optional YAML file, then from the command line and
//! the `C8Y_*` / `C8YCTRL_*` environment variables.

use anyhow::Context;
use c8y_pact_proxy::config::{Config, Overrides};
use c8y_pact_proxy::controller::Controller;
use c8y_pact_proxy::logging;
use c8y_pact_proxy::pact::{PactMode, RecordingMode};
use c8y_pact_proxy::preprocessor::PreprocessorOptions;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "c8yctrl")]
#[command(author, version, about = "Record and replay Cumulocity REST traffic")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "C8YCTRL_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, env = "C8YCTRL_PORT")]
    port: Option<u16>,

    /// Path of the control interface
    #[arg(long, env = "C8YCTRL_ROOT")]
    root: Option<String>,

    #[arg(long, env = "C8YCTRL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Tenant URL requests are forwarded to
    #[arg(short, long, env = "C8Y_BASEURL")]
    base_url: Option<String>,

    #[arg(long, env = "C8Y_TENANT")]
    tenant: Option<String>,

    #[arg(long, env = "C8Y_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "C8Y_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Folder holding the pact files
    #[arg(short, long, env = "C8Y_PACT_FOLDER")]
    folder: Option<PathBuf>,

    /// disabled, record or apply
    #[arg(short, long, env = "C8Y_PACT_MODE")]
    mode: Option<PactMode>,

    /// append, new, replace or refresh
    #[arg(long, env = "C8Y_PACT_RECORDING_MODE")]
    recording_mode: Option<RecordingMode>,

    #[arg(long, env = "C8Y_PACT_STRICT_MOCKING")]
    strict_mocking: Option<bool>,

    /// Key paths removed from recorded records
    #[arg(long, env = "C8Y_PACT_IGNORE", value_delimiter = ',')]
    ignore: Option<Vec<String>>,

    /// Key paths whose values are replaced before storing
    #[arg(long, env = "C8Y_PACT_OBFUSCATE", value_delimiter = ',')]
    obfuscate: Option<Vec<String>>,

    #[arg(long, env = "C8Y_PACT_OBFUSCATION_PATTERN")]
    obfuscation_pattern: Option<String>,

    /// Query parameters ignored when matching request URLs
    #[arg(long, env = "C8Y_PACT_IGNORE_URL_PARAMETERS", value_delimiter = ',')]
    ignore_url_parameters: Option<Vec<String>>,
}

impl Args {
    /// Preprocessor layer from the command line and environment, if any.
    fn env_preprocessor(&mut self) -> Option<PreprocessorOptions> {
        let options = PreprocessorOptions {
            ignore: self.ignore.take(),
            obfuscate: self.obfuscate.take(),
            obfuscation_pattern: self.obfuscation_pattern.take(),
        };
        (!options.is_empty()).then_some(options)
    }

    fn overrides(self) -> Overrides {
        Overrides {
            port: self.port,
            base_url: self.base_url,
            tenant: self.tenant,
            folder: self.folder,
            resource_path: self.root,
            mode: self.mode,
            recording_mode: self.recording_mode,
            strict_mocking: self.strict_mocking,
            ignore_url_parameters: self.ignore_url_parameters,
            username: self.username,
            password: self.password,
            log_level: self.log_level,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = Args::parse();

    let mut config = match args.config.take() {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    let env_preprocessor = args.env_preprocessor();
    config.apply_overrides(args.overrides());
    config.validate()?;

    let log_level = logging::init(&config.log_level)?;

    let mut builder = Controller::builder(config).log_level(Arc::new(log_level));
    if let Some(options) = env_preprocessor {
        builder = builder.env_preprocessor(options);
    }
    let controller = builder.build()?;
    let handle = controller.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    info!("Received ctrl-c");
    handle.stop().await;
    Ok(())
}
