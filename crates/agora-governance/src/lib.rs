//! Agora Governance - Token-weighted governance and treasury engine.
//!
//! This crate provides:
//! - Stake-weighted voting power with lock period multipliers
//! - Single-level delegation with power captured at delegation time
//! - Proposal lifecycle with quorum and majority rules
//! - Timelocked execution with a grace window
//! - Treasury ledger with an append-only audit log
//!
//! [`GovernanceEngine`] ties these together and serializes every state change.

pub mod clock;
pub mod config;
pub mod delegation;
pub mod engine;
pub mod error;
pub mod proposal;
pub mod repository;
pub mod timelock;
pub mod treasury;
pub mod voting;

pub use clock::{HeightSource, ManualHeight};
pub use config::GovernanceConfig;
pub use delegation::{DelegatedPower, Delegation, DelegationRegistry};
pub use engine::{ExecutionReceipt, GovernanceEngine, GovernanceSnapshot, GovernanceState, GovernanceStats};
pub use error::{GovernanceError, RejectionReason};
pub use proposal::{Proposal, ProposalDraft, ProposalStatus, ProposalType, VoteOption, VoteRecord};
pub use timelock::Timelock;
pub use treasury::{TransactionKind, TreasuryLedger, TreasuryTransaction};
pub use voting::{AccountRecord, LockTier, VotingPowerLedger};
