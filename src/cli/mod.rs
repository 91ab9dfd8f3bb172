//! CLI entry point for the Feishu MCP server.

pub mod auth;

use clap::{Parser, Subcommand, ValueEnum};

/// Feishu document MCP server CLI
#[derive(Parser, Debug)]
#[command(name = "feishu-mcp", version, about = "Feishu document MCP server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the MCP server
    Serve(ServeArgs),
    /// Authentication management
    Auth(AuthArgs),
}

/// Arguments for `feishu-mcp serve`.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Transport to serve over
    #[arg(short, long, value_enum, default_value_t = TransportKind::Stdio)]
    pub transport: TransportKind,

    /// Port for the streamable-http transport (overrides MCP_PORT)
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum TransportKind {
    /// Serve over stdin/stdout
    Stdio,
    /// Serve over streamable HTTP at /mcp
    StreamableHttp,
}

/// Arguments for the `auth` subcommand group.
#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

/// Auth subcommands for login, status, and logout.
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Run the browser authorization flow and cache the tokens
    Login,
    /// Show whether tokens are currently cached
    Status,
    /// Clear cached tokens
    Logout,
}
