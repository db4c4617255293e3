//! End-to-end tests of the MCP HTTP binding against in-process upstreams.

mod common;

use axum::{body::Body, http::Request, http::StatusCode};
use common::{hr_legal_wallet, post_json, send, send_json, settle, test_app, FakeUpstreams};
use mcp_wallet::{config::GatewayConfig, wallet::encode_token};
use serde_json::{json, Value};
use wallet_mcp::Wallet;

fn token_uri() -> String {
    format!("/api/mcp/s/{}/mcp", encode_token("wallet-1"))
}

fn upstreams() -> FakeUpstreams {
    FakeUpstreams::new()
        .with_server("hr", &["search_policies", "leave_balance"])
        .with_server("legal", &["review_contract"])
}

#[tokio::test]
async fn test_call_tool_routes_to_one_upstream() {
    let t = test_app(upstreams(), vec![hr_legal_wallet()], GatewayConfig::default());

    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {"name": "hr.search_policies", "arguments": {"q": "pto"}}
    });
    let (status, response) = send_json(&t.app, post_json(&token_uri(), &body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["id"], 1);
    assert_eq!(
        response["result"]["content"][0]["text"],
        "hr answered search_policies with {\"q\":\"pto\"}"
    );
    assert_eq!(t.upstreams.opened(), vec!["hr".to_string()]);
    assert_eq!(
        t.upstreams.calls.lock().unwrap().clone(),
        vec![(
            "hr".to_string(),
            "search_policies".to_string(),
            json!({"q": "pto"})
        )]
    );
    assert_eq!(t.upstreams.closed(), 1);

    settle().await;
    assert_eq!(t.store.calls_made("user-1"), 1);
}

#[tokio::test]
async fn test_list_tools_isolates_unreachable_upstream() {
    let wallet = Wallet::new(
        "wallet-1",
        vec![
            wallet_mcp::UpstreamServer::new("hr", "https://hr.example/mcp"),
            wallet_mcp::UpstreamServer::new("down", "https://down.example/mcp"),
        ],
    );
    let t = test_app(upstreams(), vec![wallet], GatewayConfig::default());

    let body = json!({"jsonrpc": "2.0", "id": "l", "method": "tools/list"});
    let (status, response) = send_json(&t.app, post_json(&token_uri(), &body)).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = response["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["hr.search_policies", "hr.leave_balance"]);
    assert_eq!(
        response["result"]["tools"][0]["description"],
        "[hr] search_policies tool"
    );
}

#[tokio::test]
async fn test_invalid_params_contact_no_upstream() {
    let t = test_app(upstreams(), vec![hr_legal_wallet()], GatewayConfig::default());

    for name in ["unknown.tool", "noDotsHere"] {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": name}
        });
        let (_, response) = send_json(&t.app, post_json(&token_uri(), &body)).await;
        assert_eq!(response["error"]["code"], -32602, "{name}");
    }
    assert!(t.upstreams.opened().is_empty());
}

#[tokio::test]
async fn test_upstream_failure_maps_to_execution_error() {
    let upstreams = FakeUpstreams::new().with_failing_calls("hr", "quota exceeded");
    let t = test_app(upstreams, vec![hr_legal_wallet()], GatewayConfig::default());

    let body = json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "tools/call",
        "params": {"name": "hr.broken", "arguments": {}}
    });
    let (_, response) = send_json(&t.app, post_json(&token_uri(), &body)).await;

    assert_eq!(response["error"]["code"], -32603);
    assert_eq!(response["error"]["message"], "Failed to execute tool 'hr.broken'");
    assert_eq!(response["error"]["data"], "quota exceeded");
    assert_eq!(t.upstreams.closed(), 1);

    settle().await;
    assert_eq!(t.store.calls_made("user-1"), 0);
}

#[tokio::test]
async fn test_unknown_method_and_notifications() {
    let t = test_app(upstreams(), vec![hr_legal_wallet()], GatewayConfig::default());

    let body = json!({"jsonrpc": "2.0", "id": 4, "method": "prompts/list"});
    let (_, response) = send_json(&t.app, post_json(&token_uri(), &body)).await;
    assert_eq!(response["error"]["code"], -32601);
    assert_eq!(response["error"]["message"], "Method not found");

    let notification = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    let (status, _, body) = send(&t.app, post_json(&token_uri(), &notification)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_unresolved_wallet() {
    let t = test_app(upstreams(), vec![hr_legal_wallet()], GatewayConfig::default());
    let uri = format!("/api/mcp/s/{}/mcp", encode_token("missing"));

    let body = json!({"jsonrpc": "2.0", "id": 5, "method": "tools/list"});
    let (status, response) = send_json(&t.app, post_json(&uri, &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["error"]["code"], -32004);
    assert_eq!(response["error"]["message"], "No wallet configured");

    let notification = json!({"jsonrpc": "2.0", "method": "tools/list"});
    let (status, _, _) = send(&t.app, post_json(&uri, &notification)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(t.upstreams.opened().is_empty());
}

#[tokio::test]
async fn test_latest_fallback_is_opt_in() {
    let body = json!({"jsonrpc": "2.0", "id": 6, "method": "tools/list"});

    let closed = test_app(upstreams(), vec![hr_legal_wallet()], GatewayConfig::default());
    let (_, response) = send_json(&closed.app, post_json("/api/mcp", &body)).await;
    assert_eq!(response["error"]["code"], -32004);

    let mut config = GatewayConfig::default();
    config.wallets.allow_latest_fallback = true;
    let open = test_app(upstreams(), vec![hr_legal_wallet()], config);
    let (_, response) = send_json(&open.app, post_json("/api/mcp", &body)).await;
    assert_eq!(response["result"]["tools"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_wallet_id_from_query_and_body() {
    let t = test_app(upstreams(), vec![hr_legal_wallet()], GatewayConfig::default());
    let list = json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"});

    let (_, response) = send_json(&t.app, post_json("/api/mcp?walletId=wallet-1", &list)).await;
    assert!(response["result"]["tools"].is_array());

    let with_body_id = json!({
        "jsonrpc": "2.0",
        "id": 8,
        "method": "tools/list",
        "walletId": "wallet-1"
    });
    let (_, response) = send_json(&t.app, post_json("/api/mcp", &with_body_id)).await;
    assert!(response["result"]["tools"].is_array());
}

#[tokio::test]
async fn test_initialize_and_protocol_header() {
    let t = test_app(upstreams(), vec![hr_legal_wallet()], GatewayConfig::default());

    let body = json!({
        "jsonrpc": "2.0",
        "id": 0,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "t", "version": "1"}
        }
    });
    let (status, headers, bytes) = send(&t.app, post_json(&token_uri(), &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("mcp-protocol-version").unwrap(), "2025-03-26");

    let response: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(response["result"]["protocolVersion"], "2025-03-26");
    assert_eq!(response["result"]["capabilities"]["tools"]["listChanged"], true);
    assert_eq!(response["result"]["serverInfo"]["name"], "MCP Wallet Proxy");
}

#[tokio::test]
async fn test_batch_request() {
    let t = test_app(upstreams(), vec![hr_legal_wallet()], GatewayConfig::default());

    let batch = json!([
        {"jsonrpc": "2.0", "id": 1, "method": "initialize"},
        {"jsonrpc": "2.0", "method": "notifications/initialized"},
        {"jsonrpc": "2.0", "id": 2, "method": "nope"},
        {"jsonrpc": "2.0", "id": 9, "result": {}}
    ]);
    let (status, response) = send_json(&t.app, post_json(&token_uri(), &batch)).await;

    assert_eq!(status, StatusCode::OK);
    let responses = response.as_array().unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[1]["error"]["code"], -32601);
}

#[tokio::test]
async fn test_malformed_bodies() {
    let t = test_app(upstreams(), vec![hr_legal_wallet()], GatewayConfig::default());

    let request = Request::builder()
        .method("POST")
        .uri(token_uri())
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, response) = send_json(&t.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"]["code"], -32700);
    assert_eq!(response["id"], Value::Null);

    let (status, response) = send_json(&t.app, post_json(&token_uri(), &json!([]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"]["code"], -32600);

    let (_, response) = send_json(&t.app, post_json(&token_uri(), &json!("hello"))).await;
    assert_eq!(response["error"]["code"], -32600);
}

#[tokio::test]
async fn test_sse_response_when_accepted() {
    let t = test_app(upstreams(), vec![hr_legal_wallet()], GatewayConfig::default());

    let request = Request::builder()
        .method("POST")
        .uri(token_uri())
        .header("content-type", "application/json")
        .header("accept", "application/json, text/event-stream")
        .body(Body::from(
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}).to_string(),
        ))
        .unwrap();
    let (status, headers, body) = send(&t.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("event: message"));

    let data = text
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .unwrap();
    let response: Value = serde_json::from_str(data).unwrap();
    assert_eq!(response["id"], 1);
}

#[tokio::test]
async fn test_json_response_forced_by_config() {
    let mut config = GatewayConfig::default();
    config.server.json_response = true;
    let t = test_app(upstreams(), vec![hr_legal_wallet()], config);

    let request = Request::builder()
        .method("POST")
        .uri(token_uri())
        .header("content-type", "application/json")
        .header("accept", "application/json, text/event-stream")
        .body(Body::from(
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}).to_string(),
        ))
        .unwrap();
    let (_, headers, _) = send(&t.app, request).await;
    assert_eq!(headers.get("content-type").unwrap(), "application/json");
}

#[tokio::test]
async fn test_get_and_delete() {
    let t = test_app(upstreams(), vec![hr_legal_wallet()], GatewayConfig::default());

    let get_json = Request::builder()
        .method("GET")
        .uri(token_uri())
        .header("accept", "application/json")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&t.app, get_json).await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);

    let delete = Request::builder()
        .method("DELETE")
        .uri(token_uri())
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&t.app, delete).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(headers.get("mcp-protocol-version").is_some());
}

#[tokio::test]
async fn test_body_limit() {
    let mut config = GatewayConfig::default();
    config.server.max_body_bytes = 64;
    let t = test_app(upstreams(), vec![hr_legal_wallet()], config);

    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {"name": "hr.search_policies", "arguments": {"q": "x".repeat(256)}}
    });
    let (status, _, _) = send(&t.app, post_json(&token_uri(), &body)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(t.upstreams.opened().is_empty());
}
