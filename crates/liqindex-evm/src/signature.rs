//! Event topics and function selectors.
//!
//! topic0 of a log is the keccak256 of the event's canonical signature; a
//! call selector is the first four bytes of the same hash over a function
//! signature.

use std::sync::OnceLock;
use tiny_keccak::{Hasher, Keccak};

/// Canonical signature of the controller's hard-liquidation event.
pub const LIQUIDATE_EVENT: &str = "Liquidate(address,address,uint256,uint256,uint256)";

/// Controller view: address of the collateral token.
pub const COLLATERAL_TOKEN_FN: &str = "collateral_token()";
/// ERC-20 view: token decimals.
pub const DECIMALS_FN: &str = "decimals()";
/// Controller view: liquidation discount, 1e18 = 100%.
pub const LIQUIDATION_DISCOUNT_FN: &str = "liquidation_discount()";

pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(input);
    hasher.finalize(&mut output);
    output
}

/// `0x`-prefixed topic hash of an event signature.
pub fn event_topic(signature: &str) -> String {
    format!("0x{}", hex::encode(keccak256(signature.as_bytes())))
}

/// Four-byte call selector of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// topic0 of `Liquidate`, computed once.
pub fn liquidate_topic() -> &'static str {
    static TOPIC: OnceLock<String> = OnceLock::new();
    TOPIC.get_or_init(|| event_topic(LIQUIDATE_EVENT))
}
