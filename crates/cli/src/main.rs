mod check_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    herald_config::HeraldConfig,
    herald_proactive::{DispatchTarget, IdentityResolver, IdentitySource, Scope},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "herald", about = "Herald: proactive Teams messaging gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Explicit config file (skips discovery).
    #[arg(long, global = true, env = "HERALD_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Gateway,
    /// Send one proactive message and exit.
    Send {
        /// User identity (AAD object id) or, with `--channel`, a Teams channel id.
        #[arg(long)]
        to: String,
        #[arg(short, long)]
        message: String,
        /// Post a new thread into a channel instead of a 1:1 chat.
        #[arg(long, default_value_t = false)]
        channel: bool,
    },
    /// Validate configuration and check the reference store.
    Check,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<HeraldConfig> {
    match path {
        Some(path) => Ok(herald_config::load_from(path)?),
        None => Ok(herald_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "herald starting");

    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        // Default: start gateway when no subcommand is provided
        None | Some(Commands::Gateway) => {
            // CLI args override config values
            if let Some(bind) = cli.bind {
                config.server.bind = bind;
            }
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            herald_gateway::server::start_gateway(config).await
        },
        Some(Commands::Send {
            to,
            message,
            channel,
        }) => {
            let key = IdentityResolver::new().resolve(IdentitySource::External(&to))?;
            let scope = if channel {
                Scope::Channel
            } else {
                Scope::Personal
            };
            let engine = herald_gateway::server::build_engine(&config).await?;
            let outcome = engine
                .send_proactive(DispatchTarget::Identity(key), &message, scope)
                .await?;
            println!(
                "sent to {} ({:?}, conversation {})",
                to, outcome.path, outcome.conversation_id
            );
            Ok(())
        },
        Some(Commands::Check) => check_commands::run(&config, cli.config.as_deref()).await,
    }
}
