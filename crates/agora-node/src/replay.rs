//! Operation log replay.
//!
//! An operation log is a JSON-lines file; every line carries the height at
//! which the operation happens and the operation itself:
//!
//! ```text
//! {"height": 10, "op": {"stake": {"account": "0x…", "amount": 1000000, "lock_period": 144}}}
//! {"height": 11, "op": {"vote": {"proposal_id": 1, "voter": "0x…", "option": "for"}}}
//! ```
//!
//! Each line produces one JSON report on the output, in order.

use agora_governance::{
    AccountRecord, Delegation, ExecutionReceipt, GovernanceEngine, GovernanceError, ManualHeight,
    ProposalDraft, ProposalType, VoteOption, VoteRecord,
};
use agora_types::{Address, Amount, Height};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use tracing::{debug, warn};

/// One line of the operation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub height: Height,
    pub op: Operation,
}

/// Engine operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Stake {
        account: Address,
        amount: Amount,
        #[serde(default)]
        lock_period: Height,
    },
    Deposit {
        source: Address,
        amount: Amount,
    },
    Delegate {
        from: Address,
        to: Address,
    },
    Revoke {
        from: Address,
    },
    Propose {
        proposer: Address,
        title: String,
        #[serde(default)]
        description: String,
        proposal_type: String,
        #[serde(default)]
        target: Option<Address>,
        #[serde(default)]
        amount: Amount,
    },
    Vote {
        proposal_id: u64,
        voter: Address,
        option: String,
    },
    Queue {
        proposal_id: u64,
    },
    Execute {
        proposal_id: u64,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Stake { .. } => "stake",
            Operation::Deposit { .. } => "deposit",
            Operation::Delegate { .. } => "delegate",
            Operation::Revoke { .. } => "revoke",
            Operation::Propose { .. } => "propose",
            Operation::Vote { .. } => "vote",
            Operation::Queue { .. } => "queue",
            Operation::Execute { .. } => "execute",
        }
    }
}

/// Successful operation result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpResult {
    Staked(AccountRecord),
    Deposited { tx_id: u64 },
    Delegated(Delegation),
    Revoked(Delegation),
    Proposed { proposal_id: u64 },
    Voted(VoteRecord),
    Queued { eta: Height },
    Executed(ExecutionReceipt),
}

/// Report for one log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineReport {
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<Height>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<OpResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Totals for a replayed log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub rejected: usize,
}

/// Move the height source to `entry.height` and apply the operation.
pub fn apply_entry(engine: &GovernanceEngine, entry: LogEntry) -> Result<OpResult, GovernanceError> {
    engine.height_source().set(entry.height)?;

    match entry.op {
        Operation::Stake {
            account,
            amount,
            lock_period,
        } => engine.stake(account, amount, lock_period).map(OpResult::Staked),
        Operation::Deposit { source, amount } => engine
            .deposit(source, amount)
            .map(|tx_id| OpResult::Deposited { tx_id }),
        Operation::Delegate { from, to } => engine.delegate(from, to).map(OpResult::Delegated),
        Operation::Revoke { from } => engine.revoke_delegation(from).map(OpResult::Revoked),
        Operation::Propose {
            proposer,
            title,
            description,
            proposal_type,
            target,
            amount,
        } => {
            let draft = ProposalDraft {
                title,
                description,
                proposal_type: proposal_type.parse::<ProposalType>()?,
                target,
                amount,
            };
            engine
                .create_proposal(proposer, draft)
                .map(|proposal_id| OpResult::Proposed { proposal_id })
        }
        Operation::Vote {
            proposal_id,
            voter,
            option,
        } => engine
            .vote(proposal_id, voter, option.parse::<VoteOption>()?)
            .map(OpResult::Voted),
        Operation::Queue { proposal_id } => engine.queue(proposal_id).map(|eta| OpResult::Queued { eta }),
        Operation::Execute { proposal_id } => engine.execute(proposal_id).map(OpResult::Executed),
    }
}

/// Apply every line of `input` and write one report per line to `output`.
///
/// Rejected operations and malformed lines are reported and skipped; only
/// I/O failures abort the replay.
pub fn replay<R: BufRead, W: Write>(
    engine: &GovernanceEngine<ManualHeight>,
    input: R,
    mut output: W,
) -> anyhow::Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let number = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let report = match serde_json::from_str::<LogEntry>(&line) {
            Ok(entry) => {
                let height = entry.height;
                let op = entry.op.name();
                match apply_entry(engine, entry) {
                    Ok(result) => {
                        summary.applied += 1;
                        debug!(line = number, height, op, "operation applied");
                        LineReport {
                            line: number,
                            height: Some(height),
                            result: Some(result),
                            error: None,
                        }
                    }
                    Err(e) => {
                        summary.rejected += 1;
                        debug!(line = number, height, op, error = %e, "operation rejected");
                        LineReport {
                            line: number,
                            height: Some(height),
                            result: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            }
            Err(e) => {
                summary.rejected += 1;
                warn!(line = number, error = %e, "malformed log line");
                LineReport {
                    line: number,
                    height: None,
                    result: None,
                    error: Some(format!("malformed entry: {}", e)),
                }
            }
        };

        serde_json::to_writer(&mut output, &report)?;
        writeln!(output)?;
    }

    output.flush()?;
    Ok(summary)
}
