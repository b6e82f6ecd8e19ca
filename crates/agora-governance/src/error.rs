use agora_types::{Amount, Height};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a closed proposal did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// Total participation stayed below the quorum threshold.
    QuorumNotMet { actual: Amount, required: Amount },
    /// Votes in favour did not strictly exceed votes against.
    MajorityNotReached { for_votes: Amount, against_votes: Amount },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::QuorumNotMet { actual, required } => {
                write!(f, "quorum not met: {} < {}", actual, required)
            }
            RejectionReason::MajorityNotReached { for_votes, against_votes } => {
                write!(f, "majority not reached: {} for, {} against", for_votes, against_votes)
            }
        }
    }
}

/// Errors that can occur in governance operations.
///
/// Every operation either commits completely or fails with one of these and
/// leaves the state untouched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernanceError {
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Proposal not found: {0}")]
    ProposalNotFound(u64),

    #[error("Voting period ended at height {ends_at}")]
    VotingPeriodEnded { ends_at: Height },

    #[error("Voting period active until height {ends_at}")]
    VotingPeriodActive { ends_at: Height },

    #[error("Proposal not passed: {0}")]
    ProposalNotPassed(RejectionReason),

    #[error("Proposal already executed")]
    AlreadyExecuted,

    #[error("Proposal already queued with eta {eta}")]
    AlreadyQueued { eta: Height },

    #[error("Timelock not expired")]
    TimelockNotExpired { eta: Option<Height> },

    #[error("Proposal expired at height {expired_at}")]
    ProposalExpired { expired_at: Height },

    #[error("Insufficient voting power: have {have}, need {need}")]
    InsufficientTokens { have: Amount, need: Amount },

    #[error("Already voted")]
    AlreadyVoted,

    #[error("Invalid vote option: {0}")]
    InvalidVote(String),

    #[error("Invalid proposal type: {0}")]
    InvalidProposalType(String),

    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("Treasury has insufficient funds: balance {balance}, requested {requested}")]
    TreasuryInsufficientFunds { balance: Amount, requested: Amount },

    #[error("Self-delegation not allowed")]
    SelfDelegation,

    #[error("Height source went backwards: last {last}, now {now}")]
    HeightRegression { last: Height, now: Height },

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

impl GovernanceError {
    pub(crate) fn corrupt(detail: impl Into<String>) -> Self {
        GovernanceError::CorruptSnapshot(detail.into())
    }
}
