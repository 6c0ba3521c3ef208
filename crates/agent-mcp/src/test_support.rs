//! In-process MCP server on top of wiremock for transport and manager tests.

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::config::{HttpConfig, McpServerConfig, TransportConfig};

pub const SESSION_ID: &str = "session-1";

struct McpResponder;

impl McpResponder {
    fn tool_result(params: &Value) -> Value {
        let name = params["name"].as_str().unwrap_or_default();
        match name {
            "get_user" => {
                let id = &params["arguments"]["user_id"];
                json!({"content": [{"type": "text", "text": format!("User {}: Ada", id)}]})
            }
            "delete_user" => json!({
                "content": [{"type": "text", "text": "permission denied"}],
                "isError": true
            }),
            _ => Value::Null,
        }
    }
}

impl Respond for McpResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return ResponseTemplate::new(400);
        };
        let method = body["method"].as_str().unwrap_or_default();

        let Some(id) = body.get("id").cloned() else {
            return ResponseTemplate::new(202);
        };

        let result = match method {
            "initialize" => json!({
                "protocolVersion": "2025-03-26",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "users-mcp", "version": "0.3.1"}
            }),
            "tools/list" => json!({
                "tools": [
                    {
                        "name": "get_user",
                        "description": "Look up a user",
                        "inputSchema": {
                            "type": "object",
                            "properties": {"user_id": {"type": "integer"}},
                            "required": ["user_id"]
                        }
                    },
                    {"name": "delete_user", "description": "Delete a user"}
                ]
            }),
            "tools/call" => Self::tool_result(&body["params"]),
            _ => Value::Null,
        };

        let payload = if result.is_null() {
            json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32602, "message": "Unknown tool or method"}})
        } else {
            json!({"jsonrpc": "2.0", "id": id, "result": result})
        };

        ResponseTemplate::new(200)
            .insert_header("mcp-session-id", SESSION_ID)
            .insert_header("content-type", "application/json")
            .set_body_string(payload.to_string())
    }
}

/// Only `initialize` may arrive without the session header; anything else
/// without it falls through to wiremock's 404.
pub async fn mount_mcp_server(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({"method": "initialize"})))
        .respond_with(McpResponder)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(header("mcp-session-id", SESSION_ID))
        .respond_with(McpResponder)
        .mount(server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

pub fn http_server_config(id: &str, server: &MockServer) -> McpServerConfig {
    McpServerConfig {
        id: id.to_string(),
        name: None,
        enabled: true,
        transport: TransportConfig::Http(HttpConfig {
            url: format!("{}/mcp", server.uri()),
            headers: Default::default(),
        }),
        request_timeout_ms: 5000,
        allowed_tools: Vec::new(),
        denied_tools: Vec::new(),
    }
}
