//! Just enough of the Stacks protocol to sign and submit receipt contract
//! calls: c32 addresses, Clarity arguments, transaction encoding and the
//! node HTTP API.

pub mod address;
pub mod c32;
pub mod clarity;
pub mod client;
pub mod transaction;

pub use address::{Account, Network, PrivateKey, StacksAddress};
pub use client::{BroadcastOutcome, ClientError, ContractClient, ReceiptCall, StacksClient};
pub use transaction::SignedTransaction;
