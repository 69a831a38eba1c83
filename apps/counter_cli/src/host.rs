//! Wires the configured wallet endpoint into a mounted session controller.

use std::sync::Arc;

use anyhow::Result;
use client_core::{ControllerOptions, MissingContractFactory, WalletSessionController};
use tokio::task::JoinHandle;
use tracing::info;
use wallet_integration::{ContractFactory, WalletProvider};
use wallet_rpc::JsonRpcWallet;

use crate::config::Settings;

pub struct SessionHost {
    pub controller: Arc<WalletSessionController>,
    background: Vec<JoinHandle<()>>,
}

impl SessionHost {
    pub async fn start(settings: &Settings) -> Result<Self> {
        let wallet = match settings.rpc_settings()? {
            Some(rpc) => JsonRpcWallet::detect(rpc).await,
            None => {
                info!("wallet: no rpc url configured");
                None
            }
        };

        let options = ControllerOptions {
            count_refresh: settings.count_refresh,
        };
        let mut background = Vec::new();
        let controller = match &wallet {
            Some(wallet) => {
                let provider: Arc<dyn WalletProvider> = wallet.clone();
                let contracts: Arc<dyn ContractFactory> = wallet.clone();
                WalletSessionController::new_with_options(Some(provider), contracts, options)
            }
            None => WalletSessionController::new_with_options(
                None,
                Arc::new(MissingContractFactory),
                options,
            ),
        };

        controller.mount().await;

        if let Some(listener) = controller.spawn_event_listener() {
            background.push(listener);
        }
        if let Some(wallet) = &wallet {
            background.push(wallet.spawn_event_watcher(settings.event_poll_interval()));
        }

        Ok(Self {
            controller,
            background,
        })
    }
}

impl Drop for SessionHost {
    fn drop(&mut self) {
        for task in &self.background {
            task.abort();
        }
    }
}
