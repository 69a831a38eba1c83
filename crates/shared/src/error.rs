use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ProviderUnavailable,
    ConnectionRejected,
    TransactionFailed,
    ReadFailed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("return data too short: expected at least {expected} bytes, got {actual}")]
    ShortData { expected: usize, actual: usize },
    #[error("uint256 value does not fit in 64 bits")]
    Overflow,
    #[error("address word has non-zero padding")]
    DirtyAddressPadding,
    #[error("invalid hex payload: {0}")]
    InvalidHex(String),
}
