//! Feishu document operations over the authenticated pipeline.
//!
//! Each operation reshapes the raw API payload into the trimmed form the
//! MCP tools expose. Errors are returned as explicit `Result`s; converting
//! them into structured failure payloads is the tool layer's job.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::client::pipeline::{parse_response, RequestPipeline};
use crate::error::{FeishuError, Result};

/// A drive file entry, trimmed to the fields the tools expose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub token: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub parent_token: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FilesData {
    #[serde(default)]
    files: Vec<FileEntry>,
    page_token: Option<String>,
    #[serde(default)]
    has_more: bool,
}

/// One page of a folder listing.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentList {
    pub files: Vec<FileEntry>,
    pub page_token: Option<String>,
    pub has_more: bool,
}

/// Document title plus plain-text content.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentContent {
    pub document_id: String,
    pub title: Option<String>,
    pub raw_content: String,
}

/// One page of document blocks, passed through verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct BlockPage {
    pub items: Vec<Value>,
    pub page_token: Option<String>,
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplaySetting {
    #[serde(default)]
    pub show_authors: bool,
    #[serde(default)]
    pub show_create_time: bool,
    #[serde(default)]
    pub show_pv: bool,
    #[serde(default)]
    pub show_uv: bool,
    #[serde(default)]
    pub show_like_count: bool,
    #[serde(default)]
    pub show_comment_count: bool,
    #[serde(default)]
    pub show_related_matters: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cover {
    pub token: Option<String>,
    #[serde(default)]
    pub offset_ratio_x: f64,
    #[serde(default)]
    pub offset_ratio_y: f64,
}

/// Basic document metadata.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub document_id: Option<String>,
    pub revision_id: Option<i64>,
    pub title: Option<String>,
    pub display_setting: DisplaySetting,
    pub cover: Option<Cover>,
}

/// A search hit, trimmed to the fields the tools expose.
#[derive(Debug, Clone, Serialize)]
pub struct SearchEntry {
    pub token: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub owner_id: Option<String>,
}

/// One page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub files: Vec<SearchEntry>,
    pub has_more: bool,
    pub total: i64,
}

/// Outcome of a batch update. Advanced mode returns the raw response data;
/// simple mode returns the updated block's id and status.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    Advanced { data: Value },
    Simple { block_id: Option<String>, status: Option<Value> },
}

/// Blocks created by `create_blocks`, passed through verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedBlocks {
    pub children: Vec<Value>,
}

/// Outcome of a block deletion.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub document_revision_id: Option<i64>,
    pub client_token: Option<String>,
}

/// Service for managing Feishu documents: listing, reading, searching,
/// and block-level edits.
pub struct DocumentService {
    pipeline: Arc<RequestPipeline>,
    base_url: String,
}

impl DocumentService {
    pub fn new(pipeline: Arc<RequestPipeline>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            pipeline,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|err| FeishuError::Configuration(format!("invalid API URL: {err}")))
    }

    /// List documents in a folder (or the root directory) via the drive API.
    pub async fn list_documents(
        &self,
        folder_token: Option<&str>,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<DocumentList> {
        let mut url = self.endpoint("/drive/v1/files")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("page_size", &page_size.to_string());
            if let Some(folder_token) = folder_token {
                query.append_pair("folder_token", folder_token);
            }
            if let Some(page_token) = page_token {
                query.append_pair("page_token", page_token);
            }
        }

        let response = self.pipeline.get(url.as_str()).await?;
        let data = parse_response(response).await?;
        let files: FilesData = serde_json::from_value(data)?;
        Ok(DocumentList {
            files: files.files,
            page_token: files.page_token,
            has_more: files.has_more,
        })
    }

    /// Get a document's title and plain-text content.
    pub async fn get_document_content(&self, document_id: &str, lang: i32) -> Result<DocumentContent> {
        let url = self.endpoint(&format!("/docx/v1/documents/{document_id}"))?;
        let response = self.pipeline.get(url.as_str()).await?;
        let data = parse_response(response).await?;
        let document = data.get("document").cloned().unwrap_or(Value::Null);
        if document.is_null() {
            return Err(FeishuError::InvalidArgument(
                "document not found or content unavailable".to_string(),
            ));
        }
        let title = document
            .get("title")
            .and_then(Value::as_str)
            .map(String::from);

        let mut raw_url = self.endpoint(&format!("/docx/v1/documents/{document_id}/raw_content"))?;
        raw_url
            .query_pairs_mut()
            .append_pair("lang", &lang.to_string());
        let raw_response = self.pipeline.get(raw_url.as_str()).await?;
        let raw_data = parse_response(raw_response).await?;
        let raw_content = raw_data
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(DocumentContent {
            document_id: document_id.to_string(),
            title,
            raw_content,
        })
    }

    /// Get one page of a document's blocks. `page_size` is capped at 500.
    pub async fn get_document_blocks(
        &self,
        document_id: &str,
        page_size: u32,
        page_token: Option<&str>,
        document_revision_id: i64,
        user_id_type: &str,
    ) -> Result<BlockPage> {
        let mut url = self.endpoint(&format!("/docx/v1/documents/{document_id}/blocks"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("page_size", &page_size.min(500).to_string());
            query.append_pair("document_revision_id", &document_revision_id.to_string());
            query.append_pair("user_id_type", user_id_type);
            if let Some(page_token) = page_token {
                query.append_pair("page_token", page_token);
            }
        }

        let response = self.pipeline.get(url.as_str()).await?;
        let data = parse_response(response).await?;
        let items = data
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(BlockPage {
            items,
            page_token: data
                .get("page_token")
                .and_then(Value::as_str)
                .map(String::from),
            has_more: data
                .get("has_more")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    /// Get document basic information (title, revision, display settings).
    pub async fn get_document_info(&self, document_id: &str) -> Result<DocumentInfo> {
        let url = self.endpoint(&format!("/docx/v1/documents/{document_id}"))?;
        let response = self.pipeline.get(url.as_str()).await?;
        let data = parse_response(response).await?;
        let document = data.get("document").cloned().unwrap_or(Value::Null);
        if document.is_null() {
            return Err(FeishuError::InvalidArgument(
                "document not found or information unavailable".to_string(),
            ));
        }

        let display_setting = document
            .get("display_setting")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        let cover = document
            .get("cover")
            .filter(|cover| !cover.is_null())
            .cloned()
            .map(serde_json::from_value)
            .transpose()?;

        Ok(DocumentInfo {
            document_id: document
                .get("document_id")
                .and_then(Value::as_str)
                .map(String::from),
            revision_id: document.get("revision_id").and_then(Value::as_i64),
            title: document.get("title").and_then(Value::as_str).map(String::from),
            display_setting,
            cover,
        })
    }

    /// Search documents via the suite search API. `page_token` carries the
    /// numeric offset between pages; `page_size` is capped at 50.
    pub async fn search_documents(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
        owner_ids: Option<&[String]>,
        chat_ids: Option<&[String]>,
        docs_types: Option<&[String]>,
    ) -> Result<SearchResults> {
        let url = self.endpoint("/suite/docs-api/search/object")?;

        let offset = page_token
            .and_then(|token| token.parse::<i64>().ok())
            .unwrap_or(0);
        let mut body = serde_json::json!({
            "search_key": query,
            "count": page_size.min(50),
            "offset": offset,
        });
        if let Some(owner_ids) = owner_ids {
            body["owner_ids"] = serde_json::json!(owner_ids);
        }
        if let Some(chat_ids) = chat_ids {
            body["chat_ids"] = serde_json::json!(chat_ids);
        }
        if let Some(docs_types) = docs_types {
            body["docs_types"] = serde_json::json!(docs_types);
        }

        let response = self.pipeline.post(url.as_str(), &body).await?;
        let data = parse_response(response).await?;
        let entities = data
            .get("docs_entities")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let files = entities
            .iter()
            .map(|item| {
                let title = item.get("title").and_then(Value::as_str).map(String::from);
                SearchEntry {
                    token: item
                        .get("docs_token")
                        .and_then(Value::as_str)
                        .map(String::from),
                    name: title.clone(),
                    title,
                    kind: item
                        .get("docs_type")
                        .and_then(Value::as_str)
                        .map(String::from),
                    owner_id: item
                        .get("owner_id")
                        .and_then(Value::as_str)
                        .map(String::from),
                }
            })
            .collect();

        Ok(SearchResults {
            files,
            has_more: data
                .get("has_more")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            total: data.get("total").and_then(Value::as_i64).unwrap_or(0),
        })
    }

    /// Update document content via the batch_update API.
    ///
    /// Simple mode takes `content` + `block_id` and builds a single
    /// `update_text_elements` request; advanced mode passes `requests`
    /// through unchanged.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_document(
        &self,
        document_id: &str,
        content: Option<&str>,
        block_id: Option<&str>,
        requests: Option<Vec<Value>>,
        document_revision_id: i64,
        client_token: Option<&str>,
        user_id_type: &str,
    ) -> Result<UpdateOutcome> {
        let advanced = requests.is_some();
        let update_requests = match (requests, content, block_id) {
            (Some(requests), _, _) => requests,
            (None, Some(content), Some(block_id)) => vec![serde_json::json!({
                "block_id": block_id,
                "update_text_elements": {
                    "elements": [
                        { "text_run": { "content": content } },
                    ],
                },
            })],
            _ => {
                return Err(FeishuError::InvalidArgument(
                    "either (content and block_id) or requests must be provided".to_string(),
                ))
            }
        };

        let mut url =
            self.endpoint(&format!("/docx/v1/documents/{document_id}/blocks/batch_update"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("document_revision_id", &document_revision_id.to_string());
            query.append_pair("user_id_type", user_id_type);
            if let Some(client_token) = client_token {
                query.append_pair("client_token", client_token);
            }
        }

        let body = serde_json::json!({ "requests": update_requests });
        let response = self.pipeline.patch(url.as_str(), &body).await?;
        let data = parse_response(response).await?;

        if advanced {
            return Ok(UpdateOutcome::Advanced { data });
        }
        let responses = data
            .get("responses")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let first = responses.first().ok_or_else(|| {
            FeishuError::InvalidArgument("no response from batch update".to_string())
        })?;
        Ok(UpdateOutcome::Simple {
            block_id: first
                .get("block_id")
                .and_then(Value::as_str)
                .map(String::from),
            status: first.get("status").cloned(),
        })
    }

    /// Create child blocks under a parent block.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_blocks(
        &self,
        document_id: &str,
        block_id: &str,
        children: Vec<Value>,
        index: i64,
        document_revision_id: i64,
        client_token: Option<&str>,
        user_id_type: &str,
    ) -> Result<CreatedBlocks> {
        let mut url = self.endpoint(&format!(
            "/docx/v1/documents/{document_id}/blocks/{block_id}/children"
        ))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("document_revision_id", &document_revision_id.to_string());
            query.append_pair("user_id_type", user_id_type);
            if let Some(client_token) = client_token {
                query.append_pair("client_token", client_token);
            }
        }

        let body = serde_json::json!({ "index": index, "children": children });
        let response = self.pipeline.post(url.as_str(), &body).await?;
        let data = parse_response(response).await?;
        Ok(CreatedBlocks {
            children: data
                .get("children")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        })
    }

    /// Delete a half-open range of child blocks under a parent block.
    pub async fn delete_blocks(
        &self,
        document_id: &str,
        block_id: &str,
        start_index: i64,
        end_index: i64,
        document_revision_id: i64,
        client_token: Option<&str>,
    ) -> Result<DeleteOutcome> {
        let mut url = self.endpoint(&format!(
            "/docx/v1/documents/{document_id}/blocks/{block_id}/children/batch_delete"
        ))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("document_revision_id", &document_revision_id.to_string());
            if let Some(client_token) = client_token {
                query.append_pair("client_token", client_token);
            }
        }

        let body = serde_json::json!({
            "start_index": start_index,
            "end_index": end_index,
        });
        let response = self.pipeline.delete(url.as_str(), &body).await?;
        let data = parse_response(response).await?;
        Ok(DeleteOutcome {
            document_revision_id: data.get("document_revision_id").and_then(Value::as_i64),
            client_token: data
                .get("client_token")
                .and_then(Value::as_str)
                .map(String::from),
        })
    }
}
