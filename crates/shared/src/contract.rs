//! Fixed interface of the deployed counter contract and the ABI word codecs
//! needed to talk to it.
//!
//! The address and the human-readable ABI must match the deployed contract
//! byte for byte.

use alloy_primitives::{address, keccak256, Address, B256, U256};

use crate::error::AbiError;

pub const COUNTER_CONTRACT_ADDRESS: Address = address!("c187c62D3119A61432E7758D32716FbE62dDA9c8");

pub const COUNTER_ABI: [&str; 6] = [
    "function increment()",
    "function decrement()",
    "function getCount() view returns (uint256)",
    "function resetCounter()",
    "function owner() view returns (address)",
    "event CounterIncreased(uint256 newValue, address incrementor)",
];

const WORD_LEN: usize = 32;
const ADDRESS_PADDING: usize = WORD_LEN - 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractMethod {
    Increment,
    Decrement,
    GetCount,
    ResetCounter,
    Owner,
}

impl ContractMethod {
    pub const ALL: [ContractMethod; 5] = [
        ContractMethod::Increment,
        ContractMethod::Decrement,
        ContractMethod::GetCount,
        ContractMethod::ResetCounter,
        ContractMethod::Owner,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ContractMethod::Increment => "increment",
            ContractMethod::Decrement => "decrement",
            ContractMethod::GetCount => "getCount",
            ContractMethod::ResetCounter => "resetCounter",
            ContractMethod::Owner => "owner",
        }
    }

    /// Canonical signature hashed into the selector.
    pub fn signature(self) -> String {
        format!("{}()", self.name())
    }

    pub fn is_view(self) -> bool {
        matches!(self, ContractMethod::GetCount | ContractMethod::Owner)
    }

    pub fn selector(self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&hash[..4]);
        selector
    }

    /// None of the counter methods take arguments, so calldata is the bare selector.
    pub fn calldata(self) -> Vec<u8> {
        self.selector().to_vec()
    }
}

/// Address plus interface a contract binding is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractInterface {
    pub address: Address,
    pub abi: &'static [&'static str],
}

impl ContractInterface {
    pub fn counter() -> Self {
        Self {
            address: COUNTER_CONTRACT_ADDRESS,
            abi: &COUNTER_ABI,
        }
    }

    pub fn declares(&self, method: ContractMethod) -> bool {
        let prefix = format!("function {}(", method.name());
        self.abi.iter().any(|entry| entry.starts_with(&prefix))
    }
}

impl Default for ContractInterface {
    fn default() -> Self {
        Self::counter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterIncreased {
    pub new_value: U256,
    pub incrementor: Address,
}

impl CounterIncreased {
    pub const SIGNATURE: &'static str = "CounterIncreased(uint256,address)";

    pub fn topic() -> B256 {
        keccak256(Self::SIGNATURE.as_bytes())
    }

    /// Decodes a receipt log. Returns `Ok(None)` for logs of other events.
    /// Neither parameter is indexed, so both live in `data`.
    pub fn decode_log(topics: &[B256], data: &[u8]) -> Result<Option<Self>, AbiError> {
        if topics.first() != Some(&Self::topic()) {
            return Ok(None);
        }
        ensure_len(data, WORD_LEN * 2)?;
        let new_value = U256::from_be_slice(&data[..WORD_LEN]);
        let incrementor = decode_address(&data[WORD_LEN..WORD_LEN * 2])?;
        Ok(Some(Self {
            new_value,
            incrementor,
        }))
    }
}

pub fn decode_uint256_as_u64(data: &[u8]) -> Result<u64, AbiError> {
    ensure_len(data, WORD_LEN)?;
    let value = U256::from_be_slice(&data[..WORD_LEN]);
    if value > U256::from(u64::MAX) {
        return Err(AbiError::Overflow);
    }
    Ok(value.as_limbs()[0])
}

pub fn decode_address(data: &[u8]) -> Result<Address, AbiError> {
    ensure_len(data, WORD_LEN)?;
    if data[..ADDRESS_PADDING].iter().any(|byte| *byte != 0) {
        return Err(AbiError::DirtyAddressPadding);
    }
    Ok(Address::from_slice(&data[ADDRESS_PADDING..WORD_LEN]))
}

fn ensure_len(data: &[u8], expected: usize) -> Result<(), AbiError> {
    if data.len() < expected {
        return Err(AbiError::ShortData {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/contract_tests.rs"]
mod tests;
