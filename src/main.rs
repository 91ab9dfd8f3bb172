//! Feishu MCP server binary entry point.

use std::sync::Arc;

use clap::Parser;
use feishu_mcp::cli::{AuthCommands, Cli, Commands, ServeArgs, TransportKind};
use feishu_mcp::client::FeishuClient;
use feishu_mcp::config::Settings;
use feishu_mcp::server::{self, FeishuMcp};
use feishu_mcp::services::DocumentService;

#[tokio::main]
async fn main() {
    // Logs go to stderr; the stdio transport owns stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    let result = match cli.command {
        Commands::Serve(args) => handle_serve(args, &settings).await,
        Commands::Auth(auth_args) => match auth_args.command {
            AuthCommands::Login => feishu_mcp::cli::auth::handle_login(&settings).await,
            AuthCommands::Status => feishu_mcp::cli::auth::handle_status(&settings).await,
            AuthCommands::Logout => feishu_mcp::cli::auth::handle_logout(&settings).await,
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_serve(args: ServeArgs, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    settings.require_credentials()?;

    let client = FeishuClient::new(settings);
    let documents = Arc::new(DocumentService::new(client.pipeline().clone(), &settings.host));
    let mcp = FeishuMcp::new(documents);

    match args.transport {
        TransportKind::Stdio => server::run_stdio(mcp).await?,
        TransportKind::StreamableHttp => {
            let port = args.port.unwrap_or(settings.mcp_port);
            server::run_http(mcp, port).await?;
        }
    }
    Ok(())
}
