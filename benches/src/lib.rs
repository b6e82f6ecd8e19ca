//! Shared fixtures for the benchmarks.

use agora_governance::{GovernanceConfig, GovernanceEngine, ManualHeight};
use agora_types::Address;

/// Address with `n` in its last two bytes.
pub fn address(n: u16) -> Address {
    let mut addr = [0u8; 20];
    addr[18..].copy_from_slice(&n.to_be_bytes());
    Address::from_bytes(addr)
}

/// Engine at height 1 with `accounts` stakers of 1,000,000 tokens each.
pub fn staked_engine(accounts: u16) -> (GovernanceEngine, ManualHeight) {
    let height = ManualHeight::new(1);
    let engine = GovernanceEngine::new(GovernanceConfig::default(), height.clone())
        .expect("default config is valid");
    for n in 0..accounts {
        engine
            .stake(address(n), 1_000_000, u64::from(n % 5) * 1_500)
            .expect("stake fits");
    }
    (engine, height)
}
