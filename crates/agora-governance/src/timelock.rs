//! Timelock and execution window.
//!
//! A passed proposal is queued with `eta = now + delay`; it may execute at any
//! height in `[eta, eta + grace_period]` and lapses for good after that.

use agora_types::{Amount, Height};
use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::proposal::Proposal;

/// Queue and execution rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timelock {
    pub delay: Height,
    pub grace_period: Height,
    /// Refuse to queue a proposal twice
    pub single_shot: bool,
}

impl Timelock {
    pub fn from_config(config: &GovernanceConfig) -> Self {
        Self {
            delay: config.timelock_period,
            grace_period: config.execution_grace_period,
            single_shot: config.single_shot_queue,
        }
    }

    /// Next snapshot of `proposal` queued at `now`.
    ///
    /// Without `single_shot`, queueing again moves the eta forward.
    pub fn queue(&self, proposal: &Proposal, quorum: Amount, now: Height) -> Result<Proposal, GovernanceError> {
        if proposal.is_voting_open(now) {
            return Err(GovernanceError::VotingPeriodActive {
                ends_at: proposal.voting_ends_at,
            });
        }
        proposal
            .outcome(quorum)
            .map_err(GovernanceError::ProposalNotPassed)?;
        if proposal.executed {
            return Err(GovernanceError::AlreadyExecuted);
        }
        if let Some(expired_at) = self.expired_at(proposal, now) {
            return Err(GovernanceError::ProposalExpired { expired_at });
        }
        if let (true, Some(eta)) = (self.single_shot, proposal.execution_eta) {
            return Err(GovernanceError::AlreadyQueued { eta });
        }

        let eta = now.checked_add(self.delay).ok_or(GovernanceError::Overflow)?;
        Ok(proposal.queued(eta))
    }

    /// Check whether `proposal` may execute at `now`.
    pub fn check_executable(&self, proposal: &Proposal, now: Height) -> Result<(), GovernanceError> {
        if proposal.executed {
            return Err(GovernanceError::AlreadyExecuted);
        }
        let eta = match proposal.execution_eta {
            Some(eta) if now >= eta => eta,
            eta => return Err(GovernanceError::TimelockNotExpired { eta }),
        };
        let expired_at = eta.saturating_add(self.grace_period);
        if now > expired_at {
            return Err(GovernanceError::ProposalExpired { expired_at });
        }
        Ok(())
    }

    /// End of the execution window if it has already passed.
    fn expired_at(&self, proposal: &Proposal, now: Height) -> Option<Height> {
        proposal
            .expires_at(self.grace_period)
            .filter(|expiry| now > *expiry)
    }
}

impl Default for Timelock {
    fn default() -> Self {
        Self::from_config(&GovernanceConfig::default())
    }
}
