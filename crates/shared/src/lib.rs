pub mod contract;
pub mod domain;
pub mod error;
pub mod session;
