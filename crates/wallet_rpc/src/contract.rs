use std::{sync::Arc, time::Duration};

use alloy_primitives::hex;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{
    contract::{decode_address, decode_uint256_as_u64, ContractMethod, CounterIncreased},
    domain::{Address, BlockNumber, Signer, B256},
    error::AbiError,
};
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};
use wallet_integration::{ContractBinding, PendingTransaction, TxReceipt, WalletError};

use crate::transport::{parse_quantity, JsonRpcClient};

#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("no receipt for transaction {tx_hash} after {waited:?}")]
    Timeout { tx_hash: B256, waited: Duration },
}

#[derive(Debug, Serialize)]
struct TransactionRequest {
    from: Address,
    to: Address,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

#[derive(Debug, Deserialize)]
struct RpcLog {
    address: Address,
    #[serde(default)]
    topics: Vec<B256>,
    data: String,
}

impl RpcReceipt {
    fn into_receipt(self, tx_hash: B256, contract: Address) -> Result<TxReceipt> {
        if self.status.as_deref().and_then(parse_quantity) == Some(0) {
            return Err(WalletError::Reverted(tx_hash).into());
        }

        let mut counter_increased = Vec::new();
        for log in self.logs.iter().filter(|log| log.address == contract) {
            let data = match decode_hex(&log.data) {
                Ok(data) => data,
                Err(err) => {
                    warn!("rpc: malformed log data tx={tx_hash} err={err}");
                    continue;
                }
            };
            match CounterIncreased::decode_log(&log.topics, &data) {
                Ok(Some(event)) => counter_increased.push(event),
                Ok(None) => {}
                Err(err) => warn!("rpc: undecodable counter log tx={tx_hash} err={err}"),
            }
        }

        Ok(TxReceipt {
            tx_hash,
            block_number: self
                .block_number
                .as_deref()
                .and_then(parse_quantity)
                .map(BlockNumber),
            counter_increased,
        })
    }
}

fn decode_hex(raw: &str) -> Result<Vec<u8>, AbiError> {
    hex::decode(raw).map_err(|err| AbiError::InvalidHex(err.to_string()))
}

/// Counter binding that signs through the node's wallet (`eth_sendTransaction`).
pub struct RpcCounterContract {
    client: Arc<JsonRpcClient>,
    address: Address,
    signer: Signer,
    receipt_poll_interval: Duration,
    receipt_timeout: Duration,
}

impl RpcCounterContract {
    pub(crate) fn new(
        client: Arc<JsonRpcClient>,
        address: Address,
        signer: Signer,
        receipt_poll_interval: Duration,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            client,
            address,
            signer,
            receipt_poll_interval,
            receipt_timeout,
        }
    }

    fn request_for(&self, method: ContractMethod) -> TransactionRequest {
        TransactionRequest {
            from: self.signer.address,
            to: self.address,
            data: hex::encode_prefixed(method.calldata()),
        }
    }

    pub(crate) async fn send(&self, method: ContractMethod) -> Result<Box<dyn PendingTransaction>> {
        if method.is_view() {
            bail!("{} is a view method and cannot be sent", method.name());
        }
        let tx_hash: B256 = self
            .client
            .request("eth_sendTransaction", [self.request_for(method)])
            .await?;
        debug!("rpc: submitted method={} tx={tx_hash}", method.name());
        Ok(Box::new(RpcPendingTransaction {
            client: Arc::clone(&self.client),
            tx_hash,
            contract: self.address,
            poll_interval: self.receipt_poll_interval,
            timeout: self.receipt_timeout,
        }))
    }

    pub(crate) async fn call(&self, method: ContractMethod) -> Result<Vec<u8>> {
        if !method.is_view() {
            bail!("{} changes state and must be sent as a transaction", method.name());
        }
        let raw: String = self
            .client
            .request(
                "eth_call",
                (self.request_for(method), "latest"),
            )
            .await?;
        Ok(decode_hex(&raw)?)
    }
}

#[async_trait]
impl ContractBinding for RpcCounterContract {
    fn address(&self) -> Address {
        self.address
    }

    fn signer(&self) -> Signer {
        self.signer
    }

    async fn increment(&self) -> Result<Box<dyn PendingTransaction>> {
        self.send(ContractMethod::Increment).await
    }

    async fn decrement(&self) -> Result<Box<dyn PendingTransaction>> {
        self.send(ContractMethod::Decrement).await
    }

    async fn reset_counter(&self) -> Result<Box<dyn PendingTransaction>> {
        self.send(ContractMethod::ResetCounter).await
    }

    async fn get_count(&self) -> Result<u64> {
        let data = self.call(ContractMethod::GetCount).await?;
        Ok(decode_uint256_as_u64(&data)?)
    }

    async fn owner(&self) -> Result<Address> {
        let data = self.call(ContractMethod::Owner).await?;
        Ok(decode_address(&data)?)
    }
}

pub struct RpcPendingTransaction {
    client: Arc<JsonRpcClient>,
    tx_hash: B256,
    contract: Address,
    poll_interval: Duration,
    timeout: Duration,
}

#[async_trait]
impl PendingTransaction for RpcPendingTransaction {
    fn tx_hash(&self) -> B256 {
        self.tx_hash
    }

    async fn wait(self: Box<Self>) -> Result<TxReceipt> {
        let started = Instant::now();
        loop {
            let receipt: Option<RpcReceipt> = self
                .client
                .request("eth_getTransactionReceipt", [self.tx_hash])
                .await?;
            if let Some(receipt) = receipt {
                return receipt.into_receipt(self.tx_hash, self.contract);
            }
            let waited = started.elapsed();
            if waited >= self.timeout {
                return Err(anyhow!(ReceiptError::Timeout {
                    tx_hash: self.tx_hash,
                    waited,
                }));
            }
            sleep(self.poll_interval).await;
        }
    }
}
