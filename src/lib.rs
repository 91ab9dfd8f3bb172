//! Feishu document MCP server.
//!
//! Exposes Feishu docx documents as MCP tools over stdio or streamable HTTP,
//! authenticating as the end user via a browser-mediated OAuth2 flow with
//! local token caching and transparent refresh.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use feishu_mcp::client::FeishuClient;
//! use feishu_mcp::config::Settings;
//! use feishu_mcp::services::DocumentService;
//!
//! # async fn example() -> feishu_mcp::error::Result<()> {
//! let settings = Settings::from_env();
//! let client = FeishuClient::new(&settings);
//! let documents = DocumentService::new(client.pipeline().clone(), &settings.host);
//! let list = documents.list_documents(None, 50, None).await?;
//! println!("{} files", list.files.len());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod server;
pub mod services;
