//! In-memory wallet directory.
//!
//! Holds the wallets loaded from configuration and counts successful tool
//! calls per owner.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use wallet_mcp::{McpResult, NamespacedToolName, UsageRecorder, Wallet};

use super::resolver::WalletResolver;

#[derive(Default)]
pub struct InMemoryWalletStore {
    wallets: DashMap<String, Arc<Wallet>>,
    calls_made: DashMap<String, AtomicU64>,
}

impl InMemoryWalletStore {
    pub fn new(wallets: Vec<Wallet>) -> Self {
        let store = Self::default();
        for wallet in wallets {
            store.insert(wallet);
        }
        store
    }

    /// Add or replace a wallet.
    pub fn insert(&self, wallet: Wallet) {
        self.wallets.insert(wallet.id.clone(), Arc::new(wallet));
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Successful tool calls recorded for an owner.
    pub fn calls_made(&self, owner: &str) -> u64 {
        self.calls_made
            .get(owner)
            .map(|count| count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

#[async_trait]
impl WalletResolver for InMemoryWalletStore {
    async fn find_by_id(&self, wallet_id: &str) -> Option<Arc<Wallet>> {
        self.wallets.get(wallet_id).map(|entry| Arc::clone(entry.value()))
    }

    async fn latest(&self) -> Option<Arc<Wallet>> {
        self.wallets
            .iter()
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| b.id.cmp(&a.id))
            })
            .map(|entry| Arc::clone(entry.value()))
    }
}

#[async_trait]
impl UsageRecorder for InMemoryWalletStore {
    async fn record_tool_call(
        &self,
        owner: &str,
        wallet_id: &str,
        tool: &NamespacedToolName,
    ) -> McpResult<()> {
        let total = self
            .calls_made
            .entry(owner.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed)
            + 1;
        debug!(owner, wallet = wallet_id, tool = %tool, total, "Recorded tool call");
        Ok(())
    }
}
