// Export modules for the binary and integration tests
pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod personal;
pub mod rpc;
pub mod signer;
pub mod transport;


pub use builder::TransactionBuilder;
pub use error::{ClientError, Result, TransportError};
pub use personal::PersonalApi;
pub use rpc::{ClientConfig, RpcClient};
pub use signer::{Authorization, SignedTransaction, SigningMode, SigningOrchestrator};
