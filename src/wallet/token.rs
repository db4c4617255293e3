//! Wallet access tokens.
//!
//! A token is the wallet id in base64. Both the standard and URL-safe
//! alphabets are accepted, with or without padding.

use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD},
    Engine,
};

pub fn encode_token(wallet_id: &str) -> String {
    STANDARD.encode(wallet_id.as_bytes())
}

/// Decode a token into a wallet id. Returns `None` for anything that is not
/// base64 of a non-empty UTF-8 string.
pub fn decode_token(token: &str) -> Option<String> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    let bytes = [STANDARD, URL_SAFE, STANDARD_NO_PAD, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(token).ok())?;

    String::from_utf8(bytes).ok().filter(|id| !id.is_empty())
}

/// Tokenized MCP endpoint URL for a wallet.
pub fn wallet_endpoint_url(base_url: &str, wallet_id: &str) -> String {
    format!(
        "{}/api/mcp/s/{}/mcp",
        base_url.trim_end_matches('/'),
        encode_token(wallet_id)
    )
}
