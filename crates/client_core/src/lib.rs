pub mod controller;
pub mod error;
pub mod options;

pub use controller::{
    ActionOutcome, MissingContractFactory, SessionEvent, WalletSessionController,
};
pub use error::{CounterAction, SessionError};
pub use options::{ControllerOptions, CountRefresh};
