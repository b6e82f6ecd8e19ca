//! Proposal lifecycle management.
//!
//! Proposals go through states: Open -> Rejected | Succeeded -> Queued -> Executed | Expired

use agora_types::{Address, Amount, Height};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::error::{GovernanceError, RejectionReason};
use crate::repository::{MemoryRepository, Repository};

/// Type of governance proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalType {
    /// Treasury disbursement to `target`
    FundAllocation,
    /// Protocol parameter change
    ParameterChange,
    /// Protocol upgrade
    ProtocolUpgrade,
    /// Signalling only
    General,
}

impl ProposalType {
    /// Wire code used by external callers.
    pub fn code(&self) -> u8 {
        match self {
            ProposalType::FundAllocation => 1,
            ProposalType::ParameterChange => 2,
            ProposalType::ProtocolUpgrade => 3,
            ProposalType::General => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProposalType::FundAllocation => "fund_allocation",
            ProposalType::ParameterChange => "parameter_change",
            ProposalType::ProtocolUpgrade => "protocol_upgrade",
            ProposalType::General => "general",
        }
    }

    /// Whether execution moves treasury funds.
    pub fn moves_funds(&self) -> bool {
        matches!(self, ProposalType::FundAllocation)
    }
}

impl TryFrom<u8> for ProposalType {
    type Error = GovernanceError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(ProposalType::FundAllocation),
            2 => Ok(ProposalType::ParameterChange),
            3 => Ok(ProposalType::ProtocolUpgrade),
            4 => Ok(ProposalType::General),
            other => Err(GovernanceError::InvalidProposalType(other.to_string())),
        }
    }
}

impl FromStr for ProposalType {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "fund_allocation" => Ok(ProposalType::FundAllocation),
            "parameter_change" => Ok(ProposalType::ParameterChange),
            "protocol_upgrade" => Ok(ProposalType::ProtocolUpgrade),
            "general" => Ok(ProposalType::General),
            _ => Err(GovernanceError::InvalidProposalType(s.to_string())),
        }
    }
}

impl fmt::Display for ProposalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Vote options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOption {
    /// Vote in favor
    For,
    /// Vote against
    Against,
    /// Abstain (counts toward quorum but not majority)
    Abstain,
}

impl TryFrom<u8> for VoteOption {
    type Error = GovernanceError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(VoteOption::For),
            2 => Ok(VoteOption::Against),
            3 => Ok(VoteOption::Abstain),
            other => Err(GovernanceError::InvalidVote(other.to_string())),
        }
    }
}

impl FromStr for VoteOption {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "for" | "yes" => Ok(VoteOption::For),
            "against" | "no" => Ok(VoteOption::Against),
            "abstain" => Ok(VoteOption::Abstain),
            _ => Err(GovernanceError::InvalidVote(s.to_string())),
        }
    }
}

/// Derived lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Voting is active
    Open,
    /// Voting closed without majority or quorum
    Rejected,
    /// Voting closed, passed, not queued yet
    Succeeded,
    /// Waiting for the timelock or inside the execution window
    Queued,
    /// Executed
    Executed,
    /// Execution window lapsed
    Expired,
}

impl ProposalStatus {
    /// No further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalStatus::Rejected | ProposalStatus::Executed | ProposalStatus::Expired
        )
    }
}

/// Caller-supplied content of a new proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub title: String,
    pub description: String,
    pub proposal_type: ProposalType,
    /// Recipient for fund allocation
    #[serde(default)]
    pub target: Option<Address>,
    #[serde(default)]
    pub amount: Amount,
}

impl ProposalDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>, proposal_type: ProposalType) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            proposal_type,
            target: None,
            amount: 0,
        }
    }

    /// Fund allocation of `amount` to `recipient`.
    pub fn fund_allocation(
        title: impl Into<String>,
        description: impl Into<String>,
        recipient: Address,
        amount: Amount,
    ) -> Self {
        Self {
            target: Some(recipient),
            amount,
            ..Self::new(title, description, ProposalType::FundAllocation)
        }
    }

    /// Check title, description and recipient.
    pub fn validate(&self, max_title_len: usize, max_description_len: usize) -> Result<(), GovernanceError> {
        if self.title.trim().is_empty() {
            return Err(GovernanceError::InvalidProposal("title cannot be empty".to_string()));
        }
        if self.title.len() > max_title_len {
            return Err(GovernanceError::InvalidProposal(format!(
                "title is {} bytes, max {}",
                self.title.len(),
                max_title_len
            )));
        }
        if self.description.len() > max_description_len {
            return Err(GovernanceError::InvalidProposal(format!(
                "description is {} bytes, max {}",
                self.description.len(),
                max_description_len
            )));
        }
        if self.proposal_type.moves_funds() && self.target.is_none() {
            return Err(GovernanceError::InvalidProposal(
                "fund allocation requires a recipient".to_string(),
            ));
        }
        Ok(())
    }
}

/// Governance proposal snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub proposer: Address,
    pub title: String,
    pub description: String,
    pub proposal_type: ProposalType,
    pub target: Option<Address>,
    pub amount: Amount,
    pub votes_for: Amount,
    pub votes_against: Amount,
    pub votes_abstain: Amount,
    /// Always the sum of the three buckets
    pub total_votes: Amount,
    pub created_at: Height,
    /// Last height at which votes are accepted
    pub voting_ends_at: Height,
    pub executed: bool,
    /// Set at queue time
    pub execution_eta: Option<Height>,
    /// Once true, stays true
    pub quorum_met: bool,
}

impl Proposal {
    pub fn new(id: u64, proposer: Address, draft: ProposalDraft, created_at: Height, voting_period: Height) -> Self {
        Self {
            id,
            proposer,
            title: draft.title,
            description: draft.description,
            proposal_type: draft.proposal_type,
            target: draft.target,
            amount: draft.amount,
            votes_for: 0,
            votes_against: 0,
            votes_abstain: 0,
            total_votes: 0,
            created_at,
            voting_ends_at: created_at.saturating_add(voting_period),
            executed: false,
            execution_eta: None,
            quorum_met: false,
        }
    }

    pub fn is_voting_open(&self, now: Height) -> bool {
        now <= self.voting_ends_at
    }

    /// Next snapshot with `power` added to the `option` bucket.
    pub fn with_vote(&self, option: VoteOption, power: Amount, quorum: Amount) -> Result<Self, GovernanceError> {
        let mut next = self.clone();
        let bucket = match option {
            VoteOption::For => &mut next.votes_for,
            VoteOption::Against => &mut next.votes_against,
            VoteOption::Abstain => &mut next.votes_abstain,
        };
        *bucket = bucket.checked_add(power).ok_or(GovernanceError::Overflow)?;
        next.total_votes = self
            .total_votes
            .checked_add(power)
            .ok_or(GovernanceError::Overflow)?;
        next.quorum_met = self.quorum_met || next.total_votes >= quorum;
        Ok(next)
    }

    /// Passed means strict majority of for over against, and quorum met.
    pub fn outcome(&self, quorum: Amount) -> Result<(), RejectionReason> {
        if !self.quorum_met {
            return Err(RejectionReason::QuorumNotMet {
                actual: self.total_votes,
                required: quorum,
            });
        }
        if self.votes_for <= self.votes_against {
            return Err(RejectionReason::MajorityNotReached {
                for_votes: self.votes_for,
                against_votes: self.votes_against,
            });
        }
        Ok(())
    }

    /// Next snapshot with the execution eta set.
    pub fn queued(&self, eta: Height) -> Self {
        Self {
            execution_eta: Some(eta),
            ..self.clone()
        }
    }

    /// Next snapshot marked executed.
    pub fn executed(&self) -> Self {
        Self {
            executed: true,
            ..self.clone()
        }
    }

    /// Height after which a queued proposal can no longer execute.
    pub fn expires_at(&self, grace_period: Height) -> Option<Height> {
        self.execution_eta.map(|eta| eta.saturating_add(grace_period))
    }

    /// Derived status at `now`.
    pub fn status(&self, now: Height, quorum: Amount, grace_period: Height) -> ProposalStatus {
        if self.executed {
            return ProposalStatus::Executed;
        }
        if self.is_voting_open(now) {
            return ProposalStatus::Open;
        }
        if self.outcome(quorum).is_err() {
            return ProposalStatus::Rejected;
        }
        match self.expires_at(grace_period) {
            None => ProposalStatus::Succeeded,
            Some(expiry) if now > expiry => ProposalStatus::Expired,
            Some(_) => ProposalStatus::Queued,
        }
    }
}

/// Immutable record of a cast vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub option: VoteOption,
    /// Effective power when the vote was cast
    pub power: Amount,
    pub cast_at: Height,
}

/// Proposals and their votes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalStore {
    proposals: MemoryRepository<u64, Proposal>,
    votes: MemoryRepository<(u64, Address), VoteRecord>,
    next_id: u64,
}

impl ProposalStore {
    pub fn new() -> Self {
        Self {
            proposals: MemoryRepository::new(),
            votes: MemoryRepository::new(),
            next_id: 1,
        }
    }

    /// Store a new proposal under the next sequential id.
    pub fn insert_new(
        &mut self,
        proposer: Address,
        draft: ProposalDraft,
        created_at: Height,
        voting_period: Height,
    ) -> Result<u64, GovernanceError> {
        let id = self.next_id;
        let next_id = id.checked_add(1).ok_or(GovernanceError::Overflow)?;

        self.proposals
            .put(id, Proposal::new(id, proposer, draft, created_at, voting_period));
        self.next_id = next_id;
        Ok(id)
    }

    pub fn get(&self, id: u64) -> Option<&Proposal> {
        self.proposals.get(&id)
    }

    /// Fetch or fail with `ProposalNotFound`.
    pub fn require(&self, id: u64) -> Result<&Proposal, GovernanceError> {
        self.get(id).ok_or(GovernanceError::ProposalNotFound(id))
    }

    /// Replace the current snapshot of an existing proposal.
    ///
    /// Fails with `ProposalNotFound` rather than inserting an id that
    /// `insert_new` never handed out.
    pub fn replace(&mut self, proposal: Proposal) -> Result<(), GovernanceError> {
        if !self.proposals.contains(&proposal.id) {
            return Err(GovernanceError::ProposalNotFound(proposal.id));
        }
        self.proposals.put(proposal.id, proposal);
        Ok(())
    }

    /// Store a vote together with the tallied proposal snapshot.
    pub fn record_vote(
        &mut self,
        proposal: Proposal,
        voter: Address,
        record: VoteRecord,
    ) -> Result<(), GovernanceError> {
        if !self.proposals.contains(&proposal.id) {
            return Err(GovernanceError::ProposalNotFound(proposal.id));
        }
        self.votes.put((proposal.id, voter), record);
        self.proposals.put(proposal.id, proposal);
        Ok(())
    }

    /// Check the id sequence, keys and tallies of a loaded store.
    pub fn verify(&self) -> Result<(), GovernanceError> {
        for (id, proposal) in self.proposals.iter() {
            if proposal.id != *id {
                return Err(GovernanceError::corrupt(format!(
                    "proposal stored under {} has id {}",
                    id, proposal.id
                )));
            }
            if *id >= self.next_id {
                return Err(GovernanceError::corrupt(format!(
                    "proposal {} not below next id {}",
                    id, self.next_id
                )));
            }
            let tallied = proposal
                .votes_for
                .checked_add(proposal.votes_against)
                .and_then(|sum| sum.checked_add(proposal.votes_abstain));
            if tallied != Some(proposal.total_votes) {
                return Err(GovernanceError::corrupt(format!(
                    "proposal {} vote buckets do not sum to total",
                    id
                )));
            }
        }
        if self.next_id == 0 {
            return Err(GovernanceError::corrupt("next proposal id is zero"));
        }
        if let Some(((id, _), _)) = self.votes.iter().find(|((id, _), _)| !self.proposals.contains(id)) {
            return Err(GovernanceError::corrupt(format!("vote recorded for unknown proposal {}", id)));
        }
        Ok(())
    }

    pub fn vote(&self, proposal_id: u64, voter: &Address) -> Option<&VoteRecord> {
        self.votes.get(&(proposal_id, *voter))
    }

    pub fn has_voted(&self, proposal_id: u64, voter: &Address) -> bool {
        self.vote(proposal_id, voter).is_some()
    }

    /// All proposals ordered by id.
    pub fn all(&self) -> Vec<&Proposal> {
        self.proposals.values().collect()
    }

    pub fn count(&self) -> u64 {
        self.proposals.len() as u64
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }
}

impl Default for ProposalStore {
    fn default() -> Self {
        Self::new()
    }
}
