//! Wallet directory, tokens and per-request wallet selection.

pub mod resolver;
pub mod store;
pub mod token;

pub use resolver::{resolve_wallet, WalletLookup, WalletResolver};
pub use store::InMemoryWalletStore;
pub use token::{decode_token, encode_token, wallet_endpoint_url};
