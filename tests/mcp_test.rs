//! JSON-RPC dispatch behavior of the MCP server, driven through
//! `handle_request` without a transport.

mod common;

use std::fs;

use common::Harness;
use directory_indexer::mcp::{JsonRpcRequest, McpServer};
use serde_json::{json, Value};
use tempfile::TempDir;

fn request(value: Value) -> JsonRpcRequest {
    serde_json::from_value(value).unwrap()
}

async fn server(harness: &Harness) -> McpServer {
    McpServer::new(harness.context().await)
}

/// Unwrap the single text payload of a tool result.
fn result_text(result: &Value) -> &str {
    result["content"][0]["text"].as_str().unwrap()
}

#[tokio::test]
async fn initialize_reports_server_info() {
    let harness = Harness::new().await;
    let server = server(&harness).await;

    let response = server
        .handle_request(request(json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": { "protocolVersion": "2024-11-05", "capabilities": {},
                        "clientInfo": { "name": "test", "version": "0" } }
        })))
        .await
        .unwrap();

    let result = response.result.unwrap();
    assert_eq!(result["serverInfo"]["name"], "directory-indexer");
    assert!(result["protocolVersion"].is_string());
    assert!(response.error.is_none());
}

#[tokio::test]
async fn tools_list_names_the_five_tools() {
    let harness = Harness::new().await;
    let server = server(&harness).await;

    let response = server
        .handle_request(request(json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" })))
        .await
        .unwrap();

    let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec!["index", "search", "similar_files", "get_content", "server_info"]
    );
    for tool in &tools {
        assert!(tool["inputSchema"]["type"] == "object");
    }
}

#[tokio::test]
async fn unknown_method_is_32601() {
    let harness = Harness::new().await;
    let server = server(&harness).await;

    let response = server
        .handle_request(request(json!({ "jsonrpc": "2.0", "id": 3, "method": "bogus/method" })))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, -32601);
}

#[tokio::test]
async fn unknown_tool_is_invalid_params() {
    let harness = Harness::new().await;
    let server = server(&harness).await;

    let response = server
        .handle_request(request(json!({
            "jsonrpc": "2.0", "id": 4, "method": "tools/call",
            "params": { "name": "nonexistent_tool", "arguments": {} }
        })))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, -32602);
}

#[tokio::test]
async fn malformed_arguments_are_invalid_params() {
    let harness = Harness::new().await;
    let server = server(&harness).await;

    // directory_paths must be an array of strings.
    let response = server
        .handle_request(request(json!({
            "jsonrpc": "2.0", "id": 5, "method": "tools/call",
            "params": { "name": "index", "arguments": { "directory_paths": "just-a-string" } }
        })))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, -32602);
}

#[tokio::test]
async fn notifications_produce_no_frame() {
    let harness = Harness::new().await;
    let server = server(&harness).await;

    let response = server
        .handle_request(request(json!({ "jsonrpc": "2.0", "method": "initialized" })))
        .await;
    assert!(response.is_none());
}

#[tokio::test]
async fn get_content_round_trips_through_the_tool() {
    let harness = Harness::new().await;
    let server = server(&harness).await;

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("doc.md");
    fs::write(&file, "tool says hello").unwrap();

    let response = server
        .handle_request(request(json!({
            "jsonrpc": "2.0", "id": 6, "method": "tools/call",
            "params": { "name": "get_content",
                        "arguments": { "file_path": file.to_str().unwrap() } }
        })))
        .await
        .unwrap();

    let result = response.result.unwrap();
    assert_eq!(result_text(&result), "tool says hello");
    assert!(result.get("isError").is_none());
}

#[tokio::test]
async fn tool_failures_are_is_error_results_not_crashes() {
    let harness = Harness::new().await;
    let server = server(&harness).await;

    let response = server
        .handle_request(request(json!({
            "jsonrpc": "2.0", "id": 7, "method": "tools/call",
            "params": { "name": "get_content",
                        "arguments": { "file_path": "/definitely/missing.md" } }
        })))
        .await
        .unwrap();

    // The serve loop stays alive: failure is a result, not an RPC error.
    assert!(response.error.is_none());
    let result = response.result.unwrap();
    assert_eq!(result["isError"], true);
    assert!(result_text(&result).contains("/definitely/missing.md"));
}

#[tokio::test]
async fn server_info_tool_reports_configuration() {
    let harness = Harness::new().await;
    let server = server(&harness).await;

    let response = server
        .handle_request(request(json!({
            "jsonrpc": "2.0", "id": 8, "method": "tools/call",
            "params": { "name": "server_info", "arguments": {} }
        })))
        .await
        .unwrap();

    let result = response.result.unwrap();
    let text = result_text(&result);
    assert!(text.contains("directory-indexer"));
    assert!(text.contains("ollama"));
    assert!(text.contains(common::COLLECTION));
}
