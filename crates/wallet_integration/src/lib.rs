use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    contract::{ContractInterface, CounterIncreased},
    domain::{Address, BlockNumber, ChainId, Signer, B256},
};
use thiserror::Error;
use tokio::sync::broadcast;

/// Notifications a wallet pushes independently of any request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(ChainId),
    Disconnected,
}

/// Errors a wallet reports in a way callers may want to match on.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("user rejected the request")]
    UserRejected,
    #[error("no authorized account available")]
    NoAccount,
    #[error("transaction {0} reverted")]
    Reverted(B256),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: Option<BlockNumber>,
    pub counter_increased: Vec<CounterIncreased>,
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Interactive: may prompt the user for authorization.
    async fn request_accounts(&self) -> anyhow::Result<Vec<Address>>;
    /// Non-interactive: returns previously authorized accounts, possibly none.
    async fn get_accounts(&self) -> anyhow::Result<Vec<Address>>;
    async fn signer(&self) -> anyhow::Result<Signer>;
    fn subscribe_events(&self) -> broadcast::Receiver<WalletEvent>;
}

#[async_trait]
pub trait PendingTransaction: Send + Sync {
    fn tx_hash(&self) -> B256;
    /// Resolves once the transaction is included on-chain.
    async fn wait(self: Box<Self>) -> anyhow::Result<TxReceipt>;
}

#[async_trait]
pub trait ContractBinding: Send + Sync {
    fn address(&self) -> Address;
    fn signer(&self) -> Signer;
    async fn increment(&self) -> anyhow::Result<Box<dyn PendingTransaction>>;
    async fn decrement(&self) -> anyhow::Result<Box<dyn PendingTransaction>>;
    async fn reset_counter(&self) -> anyhow::Result<Box<dyn PendingTransaction>>;
    async fn get_count(&self) -> anyhow::Result<u64>;
    async fn owner(&self) -> anyhow::Result<Address>;
}

#[async_trait]
pub trait ContractFactory: Send + Sync {
    async fn bind(
        &self,
        interface: ContractInterface,
        signer: Signer,
    ) -> anyhow::Result<Arc<dyn ContractBinding>>;
}
