//! Governance engine.
//!
//! Owns the whole governance state behind one lock. Mutating operations take
//! the write lock, read the height, validate against the current snapshot and
//! commit every touched entity before releasing it, so concurrent callers see
//! them applied one at a time. Queries take the read lock and never observe a
//! half-applied update.

use agora_types::{Address, Amount, Height};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use crate::clock::{HeightSource, ManualHeight};
use crate::config::GovernanceConfig;
use crate::delegation::{DelegatedPower, Delegation, DelegationRegistry};
use crate::error::GovernanceError;
use crate::proposal::{Proposal, ProposalDraft, ProposalStatus, ProposalStore, VoteOption, VoteRecord};
use crate::timelock::Timelock;
use crate::treasury::{TreasuryLedger, TreasuryTransaction};
use crate::voting::{AccountRecord, VotingPowerLedger};

/// Everything the engine persists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernanceState {
    pub ledger: VotingPowerLedger,
    pub delegations: DelegationRegistry,
    pub proposals: ProposalStore,
    pub treasury: TreasuryLedger,
    /// Height of the last committed operation
    pub last_height: Height,
}

impl GovernanceState {
    /// Own power plus delegated power, or zero while delegating away.
    pub fn effective_power(&self, account: &Address) -> Result<Amount, GovernanceError> {
        if self.delegations.is_delegating(account) {
            return Ok(0);
        }
        self.ledger
            .base_power(account)
            .checked_add(self.delegations.delegated_power(account).total_power)
            .ok_or(GovernanceError::Overflow)
    }

    /// Check the cross-entity invariants of a loaded state.
    pub fn verify(&self) -> Result<(), GovernanceError> {
        self.delegations.verify()?;
        self.proposals.verify()?;
        self.treasury.verify()
    }
}

/// Serialisable engine state together with the configuration it ran under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceSnapshot {
    pub config: GovernanceConfig,
    pub state: GovernanceState,
}

/// Result of a successful execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub proposal_id: u64,
    pub executed_at: Height,
    /// Treasury transaction for fund allocations
    pub transaction_id: Option<u64>,
}

/// Aggregate governance statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceStats {
    pub proposal_count: u64,
    pub treasury_balance: Amount,
    pub total_supply: Amount,
    pub quorum_threshold: Amount,
    pub proposal_threshold: Amount,
    pub voting_period: Height,
    pub timelock_period: Height,
    pub execution_grace_period: Height,
    pub total_staked: Amount,
    pub account_count: usize,
    pub height: Height,
}

/// Token-weighted governance and treasury engine.
pub struct GovernanceEngine<H: HeightSource = ManualHeight> {
    config: GovernanceConfig,
    timelock: Timelock,
    height: H,
    state: RwLock<GovernanceState>,
}

impl<H: HeightSource> GovernanceEngine<H> {
    /// Create an engine with empty state.
    pub fn new(config: GovernanceConfig, height: H) -> Result<Self, GovernanceError> {
        Self::restore(
            GovernanceSnapshot {
                config,
                state: GovernanceState::default(),
            },
            height,
        )
    }

    /// Rebuild an engine from a snapshot.
    pub fn restore(snapshot: GovernanceSnapshot, height: H) -> Result<Self, GovernanceError> {
        snapshot.config.validate()?;
        snapshot.state.verify()?;
        let now = height.current_height();
        if now < snapshot.state.last_height {
            return Err(GovernanceError::HeightRegression {
                last: snapshot.state.last_height,
                now,
            });
        }

        info!(
            proposals = snapshot.state.proposals.count(),
            treasury = snapshot.state.treasury.balance(),
            height = now,
            "governance engine ready"
        );
        Ok(Self {
            timelock: Timelock::from_config(&snapshot.config),
            config: snapshot.config,
            height,
            state: RwLock::new(snapshot.state),
        })
    }

    /// Consistent copy of the current state.
    pub fn snapshot(&self) -> GovernanceSnapshot {
        GovernanceSnapshot {
            config: self.config.clone(),
            state: self.state.read().clone(),
        }
    }

    /// Current height, refusing a source that went backwards.
    fn observe(&self, state: &GovernanceState) -> Result<Height, GovernanceError> {
        let now = self.height.current_height();
        if now < state.last_height {
            return Err(GovernanceError::HeightRegression {
                last: state.last_height,
                now,
            });
        }
        Ok(now)
    }

    /// Run `op` as one serialized transaction.
    ///
    /// `op` must finish every fallible step before its first write.
    fn transact<T>(
        &self,
        op: impl FnOnce(&mut GovernanceState, Height) -> Result<T, GovernanceError>,
    ) -> Result<T, GovernanceError> {
        let mut state = self.state.write();
        let now = self.observe(&state)?;
        let out = op(&mut state, now)?;
        state.last_height = now;
        Ok(out)
    }

    // ---- Voting power ----

    /// Stake `amount` for `account`, locked for `lock_period` blocks.
    pub fn stake(&self, account: Address, amount: Amount, lock_period: Height) -> Result<AccountRecord, GovernanceError> {
        self.transact(|state, now| state.ledger.stake(account, amount, lock_period, now))
    }

    // ---- Treasury ----

    /// Pay `amount` into the treasury. Returns the transaction id.
    pub fn deposit(&self, source: Address, amount: Amount) -> Result<u64, GovernanceError> {
        self.transact(|state, now| {
            let id = state.treasury.deposit(source, amount, now)?;
            info!(%source, amount, tx_id = id, balance = state.treasury.balance(), "treasury deposit");
            Ok(id)
        })
    }

    // ---- Delegation ----

    /// Delegate `from`'s current base power to `to`.
    pub fn delegate(&self, from: Address, to: Address) -> Result<Delegation, GovernanceError> {
        self.transact(|state, now| {
            let power = state.ledger.base_power(&from);
            state.delegations.delegate(from, to, power, now)
        })
    }

    /// Revoke `from`'s active delegation.
    pub fn revoke_delegation(&self, from: Address) -> Result<Delegation, GovernanceError> {
        self.transact(|state, now| state.delegations.revoke(from, now))
    }

    // ---- Proposals ----

    /// Create a proposal. Returns its id.
    pub fn create_proposal(&self, proposer: Address, draft: ProposalDraft) -> Result<u64, GovernanceError> {
        self.transact(|state, now| {
            let power = state.effective_power(&proposer)?;
            let need = self.config.proposal_threshold();
            if power < need {
                return Err(GovernanceError::InsufficientTokens { have: power, need });
            }
            draft.validate(self.config.max_title_len, self.config.max_description_len)?;
            // Point-in-time check only; execution checks the balance again
            if draft.proposal_type.moves_funds() {
                state.treasury.ensure_available(draft.amount)?;
            }

            let proposal_type = draft.proposal_type;
            let id = state
                .proposals
                .insert_new(proposer, draft, now, self.config.voting_period)?;
            info!(
                proposal_id = id,
                %proposer,
                %proposal_type,
                voting_ends_at = now.saturating_add(self.config.voting_period),
                "proposal created"
            );
            Ok(id)
        })
    }

    /// Cast `voter`'s effective power on a proposal. Votes are final.
    pub fn vote(&self, proposal_id: u64, voter: Address, option: VoteOption) -> Result<VoteRecord, GovernanceError> {
        let quorum = self.config.quorum_threshold();
        self.transact(|state, now| {
            let proposal = state.proposals.require(proposal_id)?;
            if !proposal.is_voting_open(now) {
                return Err(GovernanceError::VotingPeriodEnded {
                    ends_at: proposal.voting_ends_at,
                });
            }
            if state.proposals.has_voted(proposal_id, &voter) {
                return Err(GovernanceError::AlreadyVoted);
            }
            let power = state.effective_power(&voter)?;
            if power == 0 {
                return Err(GovernanceError::InsufficientTokens { have: 0, need: 1 });
            }

            let tallied = proposal.with_vote(option, power, quorum)?;
            let quorum_reached = tallied.quorum_met && !proposal.quorum_met;
            let record = VoteRecord {
                option,
                power,
                cast_at: now,
            };
            state.proposals.record_vote(tallied, voter, record)?;

            debug!(proposal_id, %voter, ?option, power, "vote cast");
            if quorum_reached {
                info!(proposal_id, quorum, "quorum reached");
            }
            Ok(record)
        })
    }

    /// Queue a passed proposal. Returns the execution eta.
    pub fn queue(&self, proposal_id: u64) -> Result<Height, GovernanceError> {
        let quorum = self.config.quorum_threshold();
        self.transact(|state, now| {
            let proposal = state.proposals.require(proposal_id)?;
            let queued = self.timelock.queue(proposal, quorum, now)?;
            let previous = proposal.execution_eta;
            let eta = queued.execution_eta.unwrap_or(now);

            state.proposals.replace(queued)?;
            info!(proposal_id, eta, ?previous, "proposal queued");
            Ok(eta)
        })
    }

    /// Execute a queued proposal inside its execution window.
    ///
    /// Fund allocations pay out of the treasury; the payout and the executed
    /// flag are committed together.
    pub fn execute(&self, proposal_id: u64) -> Result<ExecutionReceipt, GovernanceError> {
        self.transact(|state, now| {
            let proposal = state.proposals.require(proposal_id)?;
            if let Err(err) = self.timelock.check_executable(proposal, now) {
                if let GovernanceError::ProposalExpired { expired_at } = err {
                    warn!(proposal_id, expired_at, now, "execution attempted after grace period");
                }
                return Err(err);
            }

            let executed = proposal.executed();
            let transaction_id = if executed.proposal_type.moves_funds() {
                let recipient = executed.target.ok_or_else(|| {
                    GovernanceError::InvalidProposal("fund allocation requires a recipient".to_string())
                })?;
                Some(state.treasury.debit(proposal_id, recipient, executed.amount, now)?)
            } else {
                None
            };

            let proposal_type = executed.proposal_type;
            state.proposals.replace(executed)?;
            info!(proposal_id, %proposal_type, ?transaction_id, "proposal executed");
            Ok(ExecutionReceipt {
                proposal_id,
                executed_at: now,
                transaction_id,
            })
        })
    }

    // ---- Queries ----

    pub fn proposal(&self, proposal_id: u64) -> Option<Proposal> {
        self.state.read().proposals.get(proposal_id).cloned()
    }

    /// Lifecycle status of a proposal at the current height.
    pub fn proposal_status(&self, proposal_id: u64) -> Result<ProposalStatus, GovernanceError> {
        let state = self.state.read();
        let now = self.observe(&state)?;
        let proposal = state.proposals.require(proposal_id)?;
        Ok(self.status_of(proposal, now))
    }

    /// All proposals with their current status, in id order.
    pub fn list_proposals(&self) -> Result<Vec<(Proposal, ProposalStatus)>, GovernanceError> {
        let state = self.state.read();
        let now = self.observe(&state)?;
        Ok(state
            .proposals
            .all()
            .into_iter()
            .map(|p| (p.clone(), self.status_of(p, now)))
            .collect())
    }

    fn status_of(&self, proposal: &Proposal, now: Height) -> ProposalStatus {
        proposal.status(now, self.config.quorum_threshold(), self.config.execution_grace_period)
    }

    pub fn vote_record(&self, proposal_id: u64, voter: &Address) -> Option<VoteRecord> {
        self.state.read().proposals.vote(proposal_id, voter).copied()
    }

    pub fn delegation(&self, delegator: &Address) -> Option<Delegation> {
        self.state.read().delegations.delegation(delegator).copied()
    }

    pub fn delegated_power(&self, delegate: &Address) -> DelegatedPower {
        self.state.read().delegations.delegated_power(delegate)
    }

    pub fn account(&self, account: &Address) -> AccountRecord {
        self.state.read().ledger.account(account)
    }

    pub fn effective_power(&self, account: &Address) -> Result<Amount, GovernanceError> {
        self.state.read().effective_power(account)
    }

    pub fn treasury_balance(&self) -> Amount {
        self.state.read().treasury.balance()
    }

    pub fn treasury_transaction(&self, id: u64) -> Option<TreasuryTransaction> {
        self.state.read().treasury.transaction(id).copied()
    }

    pub fn stats(&self) -> GovernanceStats {
        let state = self.state.read();
        GovernanceStats {
            proposal_count: state.proposals.count(),
            treasury_balance: state.treasury.balance(),
            total_supply: self.config.total_supply(),
            quorum_threshold: self.config.quorum_threshold(),
            proposal_threshold: self.config.proposal_threshold(),
            voting_period: self.config.voting_period,
            timelock_period: self.config.timelock_period,
            execution_grace_period: self.config.execution_grace_period,
            total_staked: state.ledger.total_staked(),
            account_count: state.ledger.account_count(),
            height: state.last_height,
        }
    }

    pub fn quorum_threshold(&self) -> Amount {
        self.config.quorum_threshold()
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    pub fn height_source(&self) -> &H {
        &self.height
    }
}
