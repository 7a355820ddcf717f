//! Chain RPC access for the deployment pipeline.
//!
//! [`ChainClient`] is the seam the pipeline is written against;
//! [`HttpChainClient`] implements it over a toncenter-style JSON-RPC
//! endpoint, with every outbound call paced by a process-wide
//! [`RateLimiter`].

pub mod http;
pub mod rate_limit;

pub use {http::HttpChainClient, rate_limit::RateLimiter};

use {
    anyhow::Result,
    ton::{Address, Nano},
};

/// Chain queries and the single submission call the deployment pipeline
/// depends on.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
    /// Account balance in nanoton.
    async fn balance(&self, address: &Address) -> Result<Nano>;

    /// Whether the account is active, meaning its code and data are
    /// initialized on chain.
    async fn is_contract_deployed(&self, address: &Address) -> Result<bool>;

    /// Current sequence number of a wallet contract. Uninitialized wallets
    /// report 0.
    async fn wallet_seqno(&self, address: &Address) -> Result<u32>;

    /// Submits a serialized external message to the network.
    async fn send_boc(&self, boc: Vec<u8>) -> Result<()>;
}
