//! Wallet selection for inbound requests.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use wallet_mcp::Wallet;

use super::token::decode_token;

/// Looks wallets up by id.
#[async_trait]
pub trait WalletResolver: Send + Sync {
    async fn find_by_id(&self, wallet_id: &str) -> Option<Arc<Wallet>>;

    /// The most recently created wallet, if any exist.
    async fn latest(&self) -> Option<Arc<Wallet>>;
}

/// Wallet hints carried by one request.
#[derive(Debug, Clone, Default)]
pub struct WalletLookup {
    /// Path token, still encoded
    pub token: Option<String>,
    /// `walletId` query parameter
    pub query_wallet_id: Option<String>,
    /// Top-level `walletId` member of the JSON body
    pub body_wallet_id: Option<String>,
}

impl WalletLookup {
    /// Candidate ids in priority order: token, query, body.
    fn candidates(&self) -> Vec<String> {
        let mut ids = Vec::with_capacity(3);
        if let Some(token) = &self.token {
            match decode_token(token) {
                Some(id) => ids.push(id),
                None => debug!("Ignoring undecodable wallet token"),
            }
        }
        ids.extend(self.query_wallet_id.iter().cloned());
        ids.extend(self.body_wallet_id.iter().cloned());
        ids.retain(|id| !id.is_empty());
        ids
    }
}

/// Pick the wallet for a request.
///
/// The first candidate id that resolves wins. When none does, the latest
/// wallet is used only if `allow_latest_fallback` is set.
pub async fn resolve_wallet(
    resolver: &dyn WalletResolver,
    lookup: &WalletLookup,
    allow_latest_fallback: bool,
) -> Option<Arc<Wallet>> {
    for id in lookup.candidates() {
        if let Some(wallet) = resolver.find_by_id(&id).await {
            return Some(wallet);
        }
        debug!(wallet = %id, "Wallet not found");
    }

    if !allow_latest_fallback {
        return None;
    }

    let wallet = resolver.latest().await?;
    warn!(
        wallet = %wallet.id,
        "No wallet named by request, falling back to most recent wallet"
    );
    Some(wallet)
}
