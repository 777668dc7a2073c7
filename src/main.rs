use anyhow::Context;
use docqa::cli::commands;
use docqa::cli::init::{self, InitConfig, InitResult};
use docqa::cli::output::Output;
use docqa::cli::{Cli, Commands};
use docqa::utils::toml_config::{DocqaConfig, LogFormat, LoggingConfig};
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match run(cli, &output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output.error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, output: &Output) -> anyhow::Result<()> {
    if let Commands::Init {
        path,
        force,
        provider,
    } = cli.command
    {
        init_logging(&LoggingConfig::default(), cli.verbose);
        return match init::run(
            InitConfig {
                path,
                force,
                provider,
            },
            output,
        ) {
            InitResult::Success | InitResult::AlreadyExists => Ok(()),
            InitResult::Error(_) => Err(anyhow::anyhow!("Initialization failed")),
        };
    }

    let config = DocqaConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    init_logging(&config.logging, cli.verbose);
    tracing::debug!(config = %cli.config.display(), "Loaded configuration");

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Index {
            files,
            text_dir,
            store,
        } => commands::index(&config, output, &files, text_dir, store).await,
        Commands::Ask {
            question,
            target,
            query,
        } => commands::ask(&config, output, &question, &target, &query).await,
        Commands::Chat { target, query } => commands::chat(&config, output, &target, &query).await,
        Commands::Inspect { store } => commands::inspect(output, &store).await,
        Commands::Files => commands::files(&config, output).await,
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the configured level.
fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let default_directive = if verbose {
        "docqa=debug,docqa_vector=debug"
    } else {
        logging.level.as_str()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
    }
}
