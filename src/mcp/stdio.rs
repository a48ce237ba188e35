//! Stdio transport
//!
//! Reads line-delimited JSON-RPC requests from stdin and writes responses
//! to stdout. Logging goes to stderr, so stdout carries frames only. The
//! loop ends at EOF; closing stdin is how clients stop the server.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::commands::CommandContext;
use crate::error::{AppError, Result};

use super::server::McpServer;
use super::types::{JsonRpcRequest, JsonRpcResponse, PARSE_ERROR};

pub async fn serve_stdio(context: CommandContext) -> Result<()> {
    let server = McpServer::new(context);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    tracing::info!("MCP server listening on stdio");
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| AppError::UserInput(format!("stdin read failed: {e}")))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: JsonRpcRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                let frame =
                    JsonRpcResponse::failure(None, PARSE_ERROR, format!("Parse error: {e}"));
                write_frame(&mut stdout, &frame).await?;
                continue;
            }
        };

        if let Some(response) = server.handle_request(request).await {
            write_frame(&mut stdout, &response).await?;
        }
    }
    tracing::info!("stdin closed; MCP server exiting");
    Ok(())
}

async fn write_frame(
    stdout: &mut tokio::io::Stdout,
    response: &JsonRpcResponse,
) -> Result<()> {
    let mut frame = serde_json::to_string(response)
        .map_err(|e| AppError::UserInput(format!("response serialization failed: {e}")))?;
    frame.push('\n');
    stdout
        .write_all(frame.as_bytes())
        .await
        .map_err(|e| AppError::UserInput(format!("stdout write failed: {e}")))?;
    stdout
        .flush()
        .await
        .map_err(|e| AppError::UserInput(format!("stdout flush failed: {e}")))?;
    Ok(())
}
