//! Voting power ledger.
//!
//! Voting power = floor(balance * stake_multiplier / 100), where the
//! multiplier is picked from the lock period chosen at stake time.

use agora_types::{percent_of, Address, Amount, Height};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::GovernanceError;
use crate::repository::{MemoryRepository, Repository};

/// Lock period tiers with multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTier {
    /// Up to 1 day (1x)
    Day,
    /// Up to 1 week (1.1x)
    Week,
    /// Up to 1 month (1.25x)
    Month,
    /// Longer than 1 month (1.5x)
    Extended,
}

impl LockTier {
    /// Blocks per day (10 minute blocks).
    pub const DAY_BLOCKS: Height = 144;
    pub const WEEK_BLOCKS: Height = 1_008;
    pub const MONTH_BLOCKS: Height = 4_320;

    /// Pick the tier for a lock period. Breakpoints are inclusive.
    pub fn for_period(lock_period: Height) -> Self {
        if lock_period <= Self::DAY_BLOCKS {
            LockTier::Day
        } else if lock_period <= Self::WEEK_BLOCKS {
            LockTier::Week
        } else if lock_period <= Self::MONTH_BLOCKS {
            LockTier::Month
        } else {
            LockTier::Extended
        }
    }

    /// Multiplier as an integer percentage (100 = 1x).
    pub fn multiplier(&self) -> u32 {
        match self {
            LockTier::Day => 100,
            LockTier::Week => 110,
            LockTier::Month => 125,
            LockTier::Extended => 150,
        }
    }
}

/// Per-account voting record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Staked tokens
    pub balance: Amount,
    /// Height until which the stake is locked
    pub locked_until: Height,
    /// One of 100, 110, 125, 150
    pub stake_multiplier: u32,
}

impl Default for AccountRecord {
    fn default() -> Self {
        Self {
            balance: 0,
            locked_until: 0,
            stake_multiplier: LockTier::Day.multiplier(),
        }
    }
}

impl AccountRecord {
    /// Base voting power before delegation.
    pub fn base_power(&self) -> Amount {
        // staked() refuses balances whose weighted power would overflow
        percent_of(self.balance, self.stake_multiplier).unwrap_or(Amount::MAX)
    }

    /// Next snapshot after staking `amount` more for `lock_period` blocks.
    ///
    /// The balance accumulates; lock expiry and multiplier are recomputed from
    /// this stake's lock period alone.
    pub fn staked(
        &self,
        amount: Amount,
        lock_period: Height,
        now: Height,
    ) -> Result<Self, GovernanceError> {
        let balance = self
            .balance
            .checked_add(amount)
            .ok_or(GovernanceError::Overflow)?;
        let locked_until = now
            .checked_add(lock_period)
            .ok_or(GovernanceError::Overflow)?;
        let stake_multiplier = LockTier::for_period(lock_period).multiplier();
        percent_of(balance, stake_multiplier).ok_or(GovernanceError::Overflow)?;

        Ok(Self {
            balance,
            locked_until,
            stake_multiplier,
        })
    }

    pub fn is_locked(&self, now: Height) -> bool {
        now < self.locked_until
    }
}

/// Ledger of account voting records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VotingPowerLedger {
    accounts: MemoryRepository<Address, AccountRecord>,
    total_staked: Amount,
}

impl VotingPowerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stake tokens for `account`, creating the record on first stake.
    pub fn stake(
        &mut self,
        account: Address,
        amount: Amount,
        lock_period: Height,
        now: Height,
    ) -> Result<AccountRecord, GovernanceError> {
        let next = self.account(&account).staked(amount, lock_period, now)?;
        let total_staked = self
            .total_staked
            .checked_add(amount)
            .ok_or(GovernanceError::Overflow)?;

        self.accounts.put(account, next);
        self.total_staked = total_staked;

        debug!(
            %account,
            amount,
            lock_period,
            multiplier = next.stake_multiplier,
            "stake recorded"
        );
        Ok(next)
    }

    /// Account record; unknown accounts read as zero-valued defaults.
    pub fn account(&self, account: &Address) -> AccountRecord {
        self.accounts.get(account).copied().unwrap_or_default()
    }

    pub fn base_power(&self, account: &Address) -> Amount {
        self.account(account).base_power()
    }

    pub fn total_staked(&self) -> Amount {
        self.total_staked
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}
