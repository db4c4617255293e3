//! HTTP client construction for upstream sessions.
//!
//! Applies the outbound proxy and the per-server bearer credential to a
//! `reqwest` client builder.

use std::time::Duration;

use super::config::McpProxyConfig;
use crate::error::{McpError, McpResult};

/// Apply proxy configuration to a ClientBuilder
///
/// Applies proxy settings without building the client, so auth headers can
/// be added afterward.
pub(crate) fn apply_proxy_to_builder(
    mut builder: reqwest::ClientBuilder,
    proxy_cfg: &McpProxyConfig,
) -> McpResult<reqwest::ClientBuilder> {
    if let Some(ref http_proxy) = proxy_cfg.http {
        let proxy = reqwest::Proxy::http(http_proxy)
            .map_err(|e| McpError::Config(format!("Invalid HTTP proxy: {}", e)))?;
        builder = builder.proxy(configure_proxy(proxy, proxy_cfg));
    }

    if let Some(ref https_proxy) = proxy_cfg.https {
        let proxy = reqwest::Proxy::https(https_proxy)
            .map_err(|e| McpError::Config(format!("Invalid HTTPS proxy: {}", e)))?;
        builder = builder.proxy(configure_proxy(proxy, proxy_cfg));
    }

    Ok(builder)
}

fn configure_proxy(mut proxy: reqwest::Proxy, proxy_cfg: &McpProxyConfig) -> reqwest::Proxy {
    if let Some(ref no_proxy) = proxy_cfg.no_proxy {
        proxy = proxy.no_proxy(reqwest::NoProxy::from_string(no_proxy));
    }

    if let (Some(ref username), Some(ref password)) = (&proxy_cfg.username, &proxy_cfg.password) {
        proxy = proxy.basic_auth(username, password);
    }

    proxy
}

/// Build request headers carrying the bearer credential, if any.
pub(crate) fn build_request_headers(
    api_key: Option<&str>,
) -> McpResult<reqwest::header::HeaderMap> {
    let mut headers = reqwest::header::HeaderMap::new();

    if let Some(key) = api_key {
        let mut value: reqwest::header::HeaderValue = format!("Bearer {}", key)
            .parse()
            .map_err(|e| McpError::Transport(format!("auth token: {}", e)))?;
        value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, value);
    }

    Ok(headers)
}

/// Build the HTTP client for one upstream session.
pub(crate) fn build_http_client(
    connect_timeout: Duration,
    proxy_config: Option<&McpProxyConfig>,
    api_key: Option<&str>,
) -> McpResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder().connect_timeout(connect_timeout);

    if let Some(proxy_cfg) = proxy_config {
        builder = apply_proxy_to_builder(builder, proxy_cfg)?;
    }

    let headers = build_request_headers(api_key)?;
    if !headers.is_empty() {
        builder = builder.default_headers(headers);
    }

    builder
        .build()
        .map_err(|e| McpError::Transport(format!("build HTTP client: {}", e)))
}
