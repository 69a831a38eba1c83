//! Wallet provider backed by an EIP-1193 style JSON-RPC endpoint: a node or
//! wallet bridge that holds the user's keys and signs `eth_sendTransaction`.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use shared::{
    contract::{ContractInterface, ContractMethod},
    domain::{Address, ChainId, Signer},
};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{info, warn};
use wallet_integration::{ContractBinding, ContractFactory, WalletError, WalletEvent, WalletProvider};

pub mod contract;
pub mod settings;
pub mod transport;

pub use contract::{RpcCounterContract, RpcPendingTransaction};
pub use settings::RpcSettings;
pub use transport::{JsonRpcClient, RpcError};

use transport::NO_PARAMS;

pub struct JsonRpcWallet {
    client: Arc<JsonRpcClient>,
    settings: RpcSettings,
    events: broadcast::Sender<WalletEvent>,
}

impl JsonRpcWallet {
    pub fn new(settings: RpcSettings) -> Arc<Self> {
        let (events, _) = broadcast::channel(32);
        Arc::new(Self {
            client: Arc::new(JsonRpcClient::new(settings.rpc_url.clone())),
            settings,
            events,
        })
    }

    /// Probes the endpoint. `None` means no wallet answered, which callers
    /// treat the same as a browser without an injected provider.
    pub async fn detect(settings: RpcSettings) -> Option<Arc<Self>> {
        let wallet = Self::new(settings);
        match wallet.chain_id().await {
            Ok(chain_id) => {
                info!(
                    "rpc: wallet detected url={} chain_id={chain_id}",
                    wallet.client.url()
                );
                Some(wallet)
            }
            Err(err) => {
                warn!(
                    "rpc: no wallet at url={} err={err:#}",
                    wallet.client.url()
                );
                None
            }
        }
    }

    pub async fn chain_id(&self) -> Result<ChainId> {
        let raw: String = self.client.request("eth_chainId", NO_PARAMS).await?;
        transport::parse_quantity(&raw)
            .map(ChainId)
            .ok_or_else(|| anyhow::anyhow!("malformed chain id '{raw}'"))
    }

    async fn observe(&self) -> Result<(Vec<Address>, ChainId)> {
        let accounts = self.get_accounts().await?;
        let chain_id = self.chain_id().await?;
        Ok((accounts, chain_id))
    }

    /// Polls accounts and chain id and publishes changes as wallet events.
    pub fn spawn_event_watcher(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let wallet = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<(Vec<Address>, ChainId)> = None;
            let mut reachable = true;

            loop {
                ticker.tick().await;
                let (accounts, chain_id) = match wallet.observe().await {
                    Ok(observed) => observed,
                    Err(err) => {
                        if reachable {
                            warn!("rpc: wallet unreachable err={err:#}");
                            let _ = wallet.events.send(WalletEvent::Disconnected);
                            reachable = false;
                        }
                        continue;
                    }
                };

                if !reachable {
                    info!("rpc: wallet reachable again");
                    reachable = true;
                    let _ = wallet
                        .events
                        .send(WalletEvent::AccountsChanged(accounts.clone()));
                } else if let Some((previous_accounts, previous_chain)) = &last {
                    if *previous_chain != chain_id {
                        let _ = wallet.events.send(WalletEvent::ChainChanged(chain_id));
                    } else if *previous_accounts != accounts {
                        let _ = wallet
                            .events
                            .send(WalletEvent::AccountsChanged(accounts.clone()));
                    }
                }
                last = Some((accounts, chain_id));
            }
        })
    }
}

#[async_trait]
impl WalletProvider for JsonRpcWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        self.client.request("eth_requestAccounts", NO_PARAMS).await
    }

    async fn get_accounts(&self) -> Result<Vec<Address>> {
        self.client.request("eth_accounts", NO_PARAMS).await
    }

    async fn signer(&self) -> Result<Signer> {
        let accounts = self.get_accounts().await?;
        let address = accounts.first().copied().ok_or(WalletError::NoAccount)?;
        Ok(Signer::new(address))
    }

    fn subscribe_events(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl ContractFactory for JsonRpcWallet {
    async fn bind(
        &self,
        interface: ContractInterface,
        signer: Signer,
    ) -> Result<Arc<dyn ContractBinding>> {
        if let Some(missing) = ContractMethod::ALL
            .into_iter()
            .find(|method| !interface.declares(*method))
        {
            anyhow::bail!(
                "interface for {} does not declare {}",
                interface.address,
                missing.name()
            );
        }
        Ok(Arc::new(RpcCounterContract::new(
            Arc::clone(&self.client),
            interface.address,
            signer,
            self.settings.receipt_poll_interval,
            self.settings.receipt_timeout,
        )))
    }
}

#[cfg(test)]
#[path = "tests/rpc_tests.rs"]
mod tests;
