//! MCP server surface: document tools, the block-structure resource, and
//! the stdio / streamable-HTTP transports.

use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        AnnotateAble, ListResourcesResult, PaginatedRequestParams, RawResource,
        ReadResourceRequestParams, ReadResourceResult, ResourceContents, ServerCapabilities,
        ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router,
    transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpService,
    },
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{FeishuError, Result as FeishuResult};
use crate::services::documents::UpdateOutcome;
use crate::services::DocumentService;

const BLOCK_STRUCTURE_URI: &str = "docx://block-structure";
const BLOCK_STRUCTURE_DOC: &str = include_str!("../../resources/docx_block_structure.md");

// ============================================================================
// Tool request types
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListDocumentsRequest {
    /// Folder token to list; omit for the root directory
    pub folder_token: Option<String>,
    /// Number of entries per page (default 50)
    pub page_size: Option<u32>,
    /// Pagination token from a previous page
    pub page_token: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetDocumentContentRequest {
    /// Document id (the token in the document URL)
    pub document_id: String,
    /// Language for mentions in raw content: 0 default, 1 English
    pub lang: Option<i32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetDocumentBlocksRequest {
    /// Document id
    pub document_id: String,
    /// Number of blocks per page (max 500, default 500)
    pub page_size: Option<u32>,
    /// Pagination token from a previous page
    pub page_token: Option<String>,
    /// Document revision, -1 for the latest
    pub document_revision_id: Option<i64>,
    /// User id type: open_id, union_id, or user_id
    pub user_id_type: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetDocumentInfoRequest {
    /// Document id
    pub document_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchDocumentsRequest {
    /// Search keywords
    pub query: String,
    /// Number of results per page (max 50, default 50)
    pub page_size: Option<u32>,
    /// Numeric offset token from a previous page
    pub page_token: Option<String>,
    /// Restrict results to these owner ids
    pub owner_ids: Option<Vec<String>>,
    /// Restrict results to documents shared in these chats
    pub chat_ids: Option<Vec<String>>,
    /// Restrict results to these document types, e.g. ["docx"]
    pub docs_types: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateDocumentRequest {
    /// Document id
    pub document_id: String,
    /// New plain-text content (simple mode, requires block_id)
    pub content: Option<String>,
    /// Block to replace the text of (simple mode, requires content)
    pub block_id: Option<String>,
    /// Raw batch_update requests (advanced mode)
    pub requests: Option<Vec<Value>>,
    /// Document revision, -1 for the latest
    pub document_revision_id: Option<i64>,
    /// Idempotency token
    pub client_token: Option<String>,
    /// User id type: open_id, union_id, or user_id
    pub user_id_type: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateBlocksRequest {
    /// Document id
    pub document_id: String,
    /// Parent block id; use the document id to append at top level
    pub block_id: String,
    /// New block objects; see the docx://block-structure resource
    pub children: Vec<Value>,
    /// Insert position among the parent's children, -1 appends
    pub index: Option<i64>,
    /// Document revision, -1 for the latest
    pub document_revision_id: Option<i64>,
    /// Idempotency token
    pub client_token: Option<String>,
    /// User id type: open_id, union_id, or user_id
    pub user_id_type: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteBlocksRequest {
    /// Document id
    pub document_id: String,
    /// Parent block id; use the document id for top-level blocks
    pub block_id: String,
    /// First child index to delete (inclusive)
    pub start_index: i64,
    /// Last child index to delete (exclusive)
    pub end_index: i64,
    /// Document revision, -1 for the latest
    pub document_revision_id: Option<i64>,
    /// Idempotency token
    pub client_token: Option<String>,
}

// ============================================================================
// Server
// ============================================================================

/// MCP server exposing Feishu document tools over a user-authorized client.
#[derive(Clone)]
pub struct FeishuMcp {
    documents: Arc<DocumentService>,
    tool_router: ToolRouter<Self>,
}

fn success(payload: Value) -> String {
    let mut body = json!({ "success": true });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), payload.as_object()) {
        for (key, value) in extra {
            body.insert(key.clone(), value.clone());
        }
    }
    body.to_string()
}

fn failure(message: impl std::fmt::Display) -> String {
    json!({ "success": false, "msg": message.to_string() }).to_string()
}

#[tool_router]
impl FeishuMcp {
    pub fn new(documents: Arc<DocumentService>) -> Self {
        Self {
            documents,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List documents in a Feishu drive folder, or the root directory when no folder token is given.")]
    async fn list_documents(&self, Parameters(req): Parameters<ListDocumentsRequest>) -> String {
        match self
            .documents
            .list_documents(
                req.folder_token.as_deref(),
                req.page_size.unwrap_or(50),
                req.page_token.as_deref(),
            )
            .await
        {
            Ok(list) => success(json!({
                "files": list.files,
                "page_token": list.page_token,
                "has_more": list.has_more,
            })),
            Err(err) => failure(format!("Failed to list documents: {err}")),
        }
    }

    #[tool(description = "Get a document's title and full plain-text content.")]
    async fn get_document_content(
        &self,
        Parameters(req): Parameters<GetDocumentContentRequest>,
    ) -> String {
        match self
            .documents
            .get_document_content(&req.document_id, req.lang.unwrap_or(0))
            .await
        {
            Ok(content) => success(json!({
                "document_id": content.document_id,
                "title": content.title,
                "raw_content": content.raw_content,
            })),
            Err(err) => failure(format!("Failed to get document content: {err}")),
        }
    }

    #[tool(description = "Get a document's block tree, one page at a time. Blocks carry ids usable with update_document, create_blocks, and delete_blocks.")]
    async fn get_document_blocks(
        &self,
        Parameters(req): Parameters<GetDocumentBlocksRequest>,
    ) -> String {
        match self
            .documents
            .get_document_blocks(
                &req.document_id,
                req.page_size.unwrap_or(500),
                req.page_token.as_deref(),
                req.document_revision_id.unwrap_or(-1),
                req.user_id_type.as_deref().unwrap_or("open_id"),
            )
            .await
        {
            Ok(page) => success(json!({
                "items": page.items,
                "page_token": page.page_token,
                "has_more": page.has_more,
            })),
            Err(err) => failure(format!("Failed to get document blocks: {err}")),
        }
    }

    #[tool(description = "Get a document's basic information: title, revision, display settings, and cover.")]
    async fn get_document_info(
        &self,
        Parameters(req): Parameters<GetDocumentInfoRequest>,
    ) -> String {
        match self.documents.get_document_info(&req.document_id).await {
            Ok(info) => success(json!({ "document": info })),
            Err(err) => failure(format!("Failed to get document info: {err}")),
        }
    }

    #[tool(description = "Search documents by keyword, optionally filtered by owner, chat, or document type.")]
    async fn search_documents(
        &self,
        Parameters(req): Parameters<SearchDocumentsRequest>,
    ) -> String {
        match self
            .documents
            .search_documents(
                &req.query,
                req.page_size.unwrap_or(50),
                req.page_token.as_deref(),
                req.owner_ids.as_deref(),
                req.chat_ids.as_deref(),
                req.docs_types.as_deref(),
            )
            .await
        {
            Ok(results) => success(json!({
                "files": results.files,
                "has_more": results.has_more,
                "total": results.total,
            })),
            Err(err) => failure(format!("Failed to search documents: {err}")),
        }
    }

    #[tool(description = "Update document content. Simple mode: pass content and block_id to replace one block's text. Advanced mode: pass raw batch_update requests (see docx://block-structure).")]
    async fn update_document(
        &self,
        Parameters(req): Parameters<UpdateDocumentRequest>,
    ) -> String {
        match self
            .documents
            .update_document(
                &req.document_id,
                req.content.as_deref(),
                req.block_id.as_deref(),
                req.requests,
                req.document_revision_id.unwrap_or(-1),
                req.client_token.as_deref(),
                req.user_id_type.as_deref().unwrap_or("open_id"),
            )
            .await
        {
            Ok(UpdateOutcome::Advanced { data }) => success(json!({ "data": data })),
            Ok(UpdateOutcome::Simple { block_id, status }) => success(json!({
                "block_id": block_id,
                "status": status,
            })),
            Err(err) => failure(format!("Failed to update document: {err}")),
        }
    }

    #[tool(description = "Create new blocks as children of a parent block. Block objects follow the shapes in the docx://block-structure resource.")]
    async fn create_blocks(&self, Parameters(req): Parameters<CreateBlocksRequest>) -> String {
        match self
            .documents
            .create_blocks(
                &req.document_id,
                &req.block_id,
                req.children,
                req.index.unwrap_or(-1),
                req.document_revision_id.unwrap_or(-1),
                req.client_token.as_deref(),
                req.user_id_type.as_deref().unwrap_or("open_id"),
            )
            .await
        {
            Ok(created) => success(json!({ "children": created.children })),
            Err(err) => failure(format!("Failed to create blocks: {err}")),
        }
    }

    #[tool(description = "Delete a range of child blocks [start_index, end_index) under a parent block.")]
    async fn delete_blocks(&self, Parameters(req): Parameters<DeleteBlocksRequest>) -> String {
        match self
            .documents
            .delete_blocks(
                &req.document_id,
                &req.block_id,
                req.start_index,
                req.end_index,
                req.document_revision_id.unwrap_or(-1),
                req.client_token.as_deref(),
            )
            .await
        {
            Ok(outcome) => success(json!({
                "document_revision_id": outcome.document_revision_id,
                "client_token": outcome.client_token,
            })),
            Err(err) => failure(format!("Failed to delete blocks: {err}")),
        }
    }
}

#[tool_handler]
impl ServerHandler for FeishuMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Feishu document MCP server. Provides tools for listing, reading, searching, \
                 and editing Feishu docx documents via a user-authorized OAuth session. Read \
                 the docx://block-structure resource before composing block edits."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<ListResourcesResult, McpError>> + Send + '_
    {
        async move {
            Ok(ListResourcesResult {
                meta: None,
                next_cursor: None,
                resources: vec![RawResource {
                    uri: BLOCK_STRUCTURE_URI.to_string(),
                    name: "block-structure".to_string(),
                    title: Some("Docx Block Structure".to_string()),
                    description: Some(
                        "Block types and payload shapes used by the docx editing tools".to_string(),
                    ),
                    mime_type: Some("text/markdown".to_string()),
                    size: None,
                    icons: None,
                    meta: None,
                }
                .no_annotation()],
            })
        }
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<ReadResourceResult, McpError>> + Send + '_
    {
        async move {
            if request.uri == BLOCK_STRUCTURE_URI {
                return Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(
                        BLOCK_STRUCTURE_DOC,
                        request.uri.clone(),
                    )],
                });
            }
            Err(McpError::invalid_params(
                format!("Unknown resource URI: {}", request.uri),
                None,
            ))
        }
    }
}

// ============================================================================
// Transports
// ============================================================================

/// Serve the MCP server over stdio until the client disconnects.
pub async fn run_stdio(server: FeishuMcp) -> FeishuResult<()> {
    tracing::info!("Starting MCP server on stdio");
    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|err| FeishuError::Transport(format!("stdio transport failed: {err}")))?;
    service
        .waiting()
        .await
        .map_err(|err| FeishuError::Transport(format!("stdio transport failed: {err}")))?;
    Ok(())
}

/// Serve the MCP server over streamable HTTP at `/mcp` on the given port.
pub async fn run_http(server: FeishuMcp, port: u16) -> FeishuResult<()> {
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let router = axum::Router::new().nest_service("/mcp", service);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "Starting MCP server on streamable HTTP");
    axum::serve(listener, router).await?;
    Ok(())
}
