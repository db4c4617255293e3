use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use mcp_wallet::{config::GatewayConfig, logging, server, wallet};

/// HTTP gateway exposing aggregated MCP wallets.
#[derive(Parser)]
#[command(name = "mcp-wallet", version, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway (default)
    Serve(ServeArgs),
    /// Print the tokenized MCP URL for a wallet
    Token(TokenArgs),
}

#[derive(Args, Clone, Default)]
struct ServeArgs {
    /// YAML configuration file
    #[arg(short, long, env = "MCP_WALLET_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "MCP_WALLET_HOST")]
    host: Option<String>,

    #[arg(short, long, env = "MCP_WALLET_PORT")]
    port: Option<u16>,

    /// Default log filter, e.g. "info" or "wallet_mcp=debug"
    #[arg(long, env = "MCP_WALLET_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,
}

#[derive(Args)]
struct TokenArgs {
    wallet_id: String,

    #[arg(long, default_value = "http://localhost:5000")]
    base_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Token(args)) => print_token(&args),
        Some(Commands::Serve(args)) => serve(args).await,
        None => serve(cli.serve).await,
    }
}

fn print_token(args: &TokenArgs) -> anyhow::Result<()> {
    url::Url::parse(&args.base_url)
        .with_context(|| format!("invalid base URL '{}'", args.base_url))?;
    println!("{}", wallet::wallet_endpoint_url(&args.base_url, &args.wallet_id));
    Ok(())
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default(),
    };

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(level) = args.log_level {
        config.log.level = level;
    }
    if args.log_json {
        config.log.json = true;
    }
    config.validate()?;

    logging::init_logging(&config.log).context("failed to initialize logging")?;

    if args.config.is_none() {
        tracing::warn!("No config file given; serving without wallets");
    }

    server::run(config).await?;
    Ok(())
}
