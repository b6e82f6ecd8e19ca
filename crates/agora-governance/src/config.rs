//! Governance parameters.
//!
//! Fixed at deployment. A future parameter-change proposal could make them
//! mutable; today they only change by restarting with a new configuration.

use agora_types::{percent_of, Amount, Height};
use serde::{Deserialize, Serialize};
use crate::error::GovernanceError;

/// Blocks a proposal stays open for voting (~1 week).
pub const VOTING_PERIOD: Height = 1_008;
/// Blocks between queueing and the earliest execution (~3 days).
pub const TIMELOCK_PERIOD: Height = 432;
/// Blocks after the eta during which execution is still allowed (~2 weeks).
pub const EXECUTION_GRACE_PERIOD: Height = 2_016;
/// Effective voting power required to create a proposal.
pub const PROPOSAL_THRESHOLD: u64 = 1_000_000;
/// Percentage of total supply that must participate.
pub const QUORUM_PERCENT: u32 = 20;
/// Total token supply used for the quorum threshold.
pub const TOTAL_SUPPLY: u64 = 100_000_000;

/// Governance configuration.
///
/// Amounts are `u64` here so the configuration round-trips through TOML;
/// the engine widens them to [`Amount`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Voting period in blocks
    pub voting_period: Height,
    /// Timelock delay in blocks
    pub timelock_period: Height,
    /// Execution grace period in blocks
    pub execution_grace_period: Height,
    /// Minimum effective power to propose
    pub proposal_threshold: u64,
    /// Quorum as a percentage of total supply
    pub quorum_percent: u32,
    /// Total token supply
    pub total_supply: u64,
    /// Reject a second `queue` instead of resetting the eta
    pub single_shot_queue: bool,
    /// Maximum proposal title length in bytes
    pub max_title_len: usize,
    /// Maximum proposal description length in bytes
    pub max_description_len: usize,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            voting_period: VOTING_PERIOD,
            timelock_period: TIMELOCK_PERIOD,
            execution_grace_period: EXECUTION_GRACE_PERIOD,
            proposal_threshold: PROPOSAL_THRESHOLD,
            quorum_percent: QUORUM_PERCENT,
            total_supply: TOTAL_SUPPLY,
            single_shot_queue: false,
            max_title_len: 256,
            max_description_len: 4_096,
        }
    }
}

impl GovernanceConfig {
    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.voting_period == 0 {
            return Err(GovernanceError::InvalidParameter("voting_period cannot be 0".into()));
        }
        if self.timelock_period == 0 {
            return Err(GovernanceError::InvalidParameter("timelock_period cannot be 0".into()));
        }
        if self.execution_grace_period == 0 {
            return Err(GovernanceError::InvalidParameter(
                "execution_grace_period cannot be 0".into(),
            ));
        }
        if self.quorum_percent == 0 || self.quorum_percent > 100 {
            return Err(GovernanceError::InvalidParameter(format!(
                "quorum_percent must be within 1..=100, got {}",
                self.quorum_percent
            )));
        }
        if self.total_supply == 0 {
            return Err(GovernanceError::InvalidParameter("total_supply cannot be 0".into()));
        }
        if self.max_title_len == 0 {
            return Err(GovernanceError::InvalidParameter("max_title_len cannot be 0".into()));
        }
        Ok(())
    }

    /// Total votes a proposal needs for its outcome to count.
    pub fn quorum_threshold(&self) -> Amount {
        // quorum_percent <= 100, so this never exceeds total_supply
        percent_of(Amount::from(self.total_supply), self.quorum_percent)
            .unwrap_or(Amount::from(self.total_supply))
    }

    pub fn proposal_threshold(&self) -> Amount {
        Amount::from(self.proposal_threshold)
    }

    pub fn total_supply(&self) -> Amount {
        Amount::from(self.total_supply)
    }
}
