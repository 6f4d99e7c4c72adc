//! Utility functions and protocol constants.

pub mod constants;
pub mod formatting;

pub use formatting::{explorer_tx_url, truncate_id, with_0x_prefix};
