//! MCP tool handlers
//!
//! Five tools over the command layer. Results wrap a single text payload;
//! engine errors come back as `isError` tool results so clients can show
//! them without the session dying.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::commands::CommandContext;
use crate::error::AppError;
use crate::search::SearchOptions;

use super::types::{
    GetContentArgs, IndexArgs, SearchArgs, SimilarArgs, Tool, ToolsListResult, INVALID_PARAMS,
};

/// How a dispatch fails at the protocol level. Tool-level failures never
/// take this path; they are rendered as `isError` results instead.
pub enum DispatchError {
    Protocol { code: i32, message: String },
    Internal(String),
}

type DispatchResult = Result<Value, DispatchError>;

pub fn handle_tools_list() -> DispatchResult {
    let tools = vec![
        Tool {
            name: "index",
            description: "Index directories for semantic search. Incremental: unchanged files are skipped, deleted files are reconciled out.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "directory_paths": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Absolute paths of the directories to index"
                    }
                },
                "required": ["directory_paths"]
            }),
        },
        Tool {
            name: "search",
            description: "Semantic search across indexed directories. Returns files ranked by best-matching chunk.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Natural language query" },
                    "limit": { "type": "integer", "description": "Maximum results (default 10, max 100)", "default": 10 },
                    "workspace": { "type": "string", "description": "Restrict results to a named workspace (WORKSPACE_<NAME> env)" },
                    "path_prefix": { "type": "string", "description": "Restrict results to paths under this prefix" },
                    "min_score": { "type": "number", "description": "Drop files scoring below this cosine similarity" }
                },
                "required": ["query"]
            }),
        },
        Tool {
            name: "similar_files",
            description: "Find files similar to a given indexed file. Search by example; the file itself is excluded.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": { "type": "string", "description": "Path of an indexed file" },
                    "limit": { "type": "integer", "description": "Maximum results (default 10)", "default": 10 }
                },
                "required": ["file_path"]
            }),
        },
        Tool {
            name: "get_content",
            description: "Read a file's content, whole or as a chunk range ('3' or '2-5', 1-based inclusive).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": { "type": "string", "description": "Path of the file to read" },
                    "chunks": { "type": "string", "description": "Optional chunk range, e.g. '2' or '1-3'" }
                },
                "required": ["file_path"]
            }),
        },
        Tool {
            name: "server_info",
            description: "Server name, version, and effective configuration.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
    ];
    serde_json::to_value(ToolsListResult { tools })
        .map_err(|e| DispatchError::Internal(e.to_string()))
}

pub async fn handle_tools_call(context: &CommandContext, params: Option<Value>) -> DispatchResult {
    let params = params.ok_or_else(|| invalid_params("missing params"))?;
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid_params("missing tool name"))?
        .to_string();
    let arguments = params
        .get("arguments")
        .cloned()
        .unwrap_or(Value::Object(Default::default()));

    let start = std::time::Instant::now();
    tracing::debug!(tool = %name, "Tool call started");

    let outcome = match name.as_str() {
        "index" => {
            let args: IndexArgs = parse_args(arguments)?;
            run(context.index(&args.directory_paths).await)
        }
        "search" => {
            let args: SearchArgs = parse_args(arguments)?;
            let opts = SearchOptions {
                limit: args.limit.unwrap_or(crate::search::DEFAULT_LIMIT),
                workspace: args.workspace,
                path_prefix: args.path_prefix,
                min_score: args.min_score,
            };
            run(context.search(&args.query, &opts).await)
        }
        "similar_files" => {
            let args: SimilarArgs = parse_args(arguments)?;
            run(
                context
                    .similar(&args.file_path, args.limit.unwrap_or(crate::search::DEFAULT_LIMIT))
                    .await,
            )
        }
        "get_content" => {
            let args: GetContentArgs = parse_args(arguments)?;
            match context.get(&args.file_path, args.chunks.as_deref()).await {
                Ok(text) => Ok(text_result(text)),
                Err(err) => Ok(error_result(&err)),
            }
        }
        "server_info" => run(Ok(context.server_info())),
        other => {
            return Err(invalid_params(&format!(
                "unknown tool '{other}' (available: index, search, similar_files, get_content, server_info)"
            )))
        }
    };

    tracing::info!(
        tool = %name,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Tool call completed"
    );
    outcome
}

/// Render a command outcome: pretty JSON on success, `isError` on failure.
fn run<T: serde::Serialize>(outcome: crate::error::Result<T>) -> DispatchResult {
    match outcome {
        Ok(value) => {
            let text = serde_json::to_string_pretty(&value)
                .map_err(|e| DispatchError::Internal(e.to_string()))?;
            Ok(text_result(text))
        }
        Err(err) => Ok(error_result(&err)),
    }
}

fn text_result(text: String) -> Value {
    json!({ "content": [ { "type": "text", "text": text } ] })
}

fn error_result(err: &AppError) -> Value {
    json!({ "content": [ { "type": "text", "text": err.to_string() } ], "isError": true })
}

fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, DispatchError> {
    serde_json::from_value(arguments).map_err(|e| invalid_params(&format!("invalid arguments: {e}")))
}

fn invalid_params(message: &str) -> DispatchError {
    DispatchError::Protocol {
        code: INVALID_PARAMS,
        message: message.to_string(),
    }
}
