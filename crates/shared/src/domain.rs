use serde::{Deserialize, Serialize};

pub use alloy_primitives::{Address, B256, U256};

macro_rules! quantity_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

quantity_newtype!(ChainId);
quantity_newtype!(BlockNumber);

/// Signing identity handed out by a wallet provider for one authorized account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    pub address: Address,
}

impl Signer {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}
