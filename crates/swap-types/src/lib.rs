//! Common types module for the swap gateway.
//!
//! This module defines the data model shared by the gateway server and the
//! swap pipeline: tokens, price and quote payloads, transactions, sign-in
//! messages and the API error surface.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Transaction types for wallet submission and receipts.
pub mod delivery;
/// Event types emitted by the swap pipeline.
pub mod events;
/// Network configuration types.
pub mod networks;
/// Price and quote payloads returned by the pricing service.
pub mod quote;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Redacting wrapper for API keys and private keys.
pub mod secret_string;
/// Sign-in-with-Ethereum (EIP-4361) message type.
pub mod siwe;
/// Static token metadata and lookups.
pub mod tokens;
/// Utility functions and protocol constants.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use alloy::primitives::{Address, Bytes, B256, U256};
pub use api::*;
pub use delivery::*;
pub use events::*;
pub use networks::{deserialize_networks, NetworkConfig, NetworksConfig};
pub use quote::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use siwe::{SiweError, SiweMessage};
pub use tokens::{Token, TokenRegistry};
pub use utils::{explorer_tx_url, truncate_id, with_0x_prefix};
pub use validation::*;
