//! Protocol constants for swaps on Polygon PoS.

use alloy::primitives::{address, Address, U256};

/// Chain id every swap must execute on.
pub const POLYGON_CHAIN_ID: u64 = 137;

/// Canonical Permit2 deployment (same address on every chain).
pub const PERMIT2_ADDRESS: Address = address!("0x000000000022D473030F116dDEE9F6B43aC78BA3");

/// Affiliate fee in basis points (1%).
pub const AFFILIATE_FEE_BPS: u16 = 100;

/// Default recipient of affiliate fees and trade surplus.
pub const FEE_RECIPIENT: Address = address!("0x75A94931B81d81C7a62b76DC0FcFAC77FbE1e917");

/// Approval amount requested from the wallet: type(uint256).max.
pub const MAX_ALLOWANCE: U256 = U256::MAX;

/// Width of the signature length word appended to permit2 calldata.
pub const SIGNATURE_LENGTH_WORD: usize = 32;

/// `balanceOf(address)`
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
/// `allowance(address,address)`
pub const ALLOWANCE_SELECTOR: [u8; 4] = [0xdd, 0x62, 0xed, 0x3e];
/// `approve(address,uint256)`
pub const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];
