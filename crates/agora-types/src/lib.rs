//! Agora Types - Shared type definitions for the Agora governance engine.
//!
//! This crate provides:
//! - Addresses (20-byte principals, Bech32m or hex encoded)
//! - Height and token amount aliases
//! - Percentage helpers used by stake multipliers and quorum math

pub mod address;
pub mod error;

#[cfg(feature = "serde")]
mod serialization;

pub use address::Address;
pub use error::TypesError;

/// Block height supplied by the external height source.
pub type Height = u64;

/// Token amount or voting power.
pub type Amount = u128;

/// Apply an integer percentage to an amount, rounding down.
///
/// Computed as `(amount / 100) * percent + (amount % 100) * percent / 100`,
/// which equals `floor(amount * percent / 100)` without the intermediate
/// product. Returns `None` on overflow.
pub fn percent_of(amount: Amount, percent: u32) -> Option<Amount> {
    let percent = Amount::from(percent);
    (amount / 100)
        .checked_mul(percent)?
        .checked_add(amount % 100 * percent / 100)
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{percent_of, Address, Amount, Height, TypesError};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_of_rounds_down() {
        assert_eq!(percent_of(1_000, 110), Some(1_100));
        assert_eq!(percent_of(7, 125), Some(8)); // 8.75
        assert_eq!(percent_of(100_000_000, 20), Some(20_000_000));
        assert_eq!(percent_of(0, 150), Some(0));
    }

    #[test]
    fn test_percent_of_overflow() {
        assert_eq!(percent_of(Amount::MAX, 150), None);
    }
}
