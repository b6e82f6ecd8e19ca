//! End-to-end proposal lifecycle tests.

use agora_governance::{
    GovernanceConfig, GovernanceEngine, GovernanceError, ManualHeight, ProposalDraft,
    ProposalStatus, ProposalType, RejectionReason, TransactionKind, VoteOption,
};
use agora_types::Address;

fn test_address(n: u8) -> Address {
    let mut addr = [0u8; 20];
    addr[19] = n;
    Address::from_bytes(addr)
}

struct Setup {
    engine: GovernanceEngine,
    height: ManualHeight,
    proposer: Address,
    whale: Address,
    recipient: Address,
}

/// Engine at height 1 with a funded treasury, a proposer at the threshold and
/// a voter holding exactly the quorum.
fn setup() -> Setup {
    let height = ManualHeight::new(1);
    let engine = GovernanceEngine::new(GovernanceConfig::default(), height.clone()).unwrap();
    let proposer = test_address(1);
    let whale = test_address(2);

    engine.stake(proposer, 1_000_000, 0).unwrap();
    engine.stake(whale, 20_000_000, 0).unwrap();
    engine.deposit(test_address(99), 1_000).unwrap();

    Setup {
        engine,
        height,
        proposer,
        whale,
        recipient: test_address(3),
    }
}

fn passed_fund_allocation(s: &Setup, amount: u128) -> u64 {
    let draft = ProposalDraft::fund_allocation("Grant", "Fund the audit", s.recipient, amount);
    let id = s.engine.create_proposal(s.proposer, draft).unwrap();
    s.engine.vote(id, s.whale, VoteOption::For).unwrap();
    id
}

#[test]
fn test_fund_allocation_round_trip() {
    let s = setup();
    let id = passed_fund_allocation(&s, 500);
    let proposal = s.engine.proposal(id).unwrap();
    assert!(proposal.quorum_met);
    assert_eq!(s.engine.proposal_status(id).unwrap(), ProposalStatus::Open);

    // Past voting_ends_at
    s.height.set(proposal.voting_ends_at + 1).unwrap();
    assert_eq!(s.engine.proposal_status(id).unwrap(), ProposalStatus::Succeeded);
    let eta = s.engine.queue(id).unwrap();
    assert_eq!(eta, proposal.voting_ends_at + 1 + 432);
    assert_eq!(s.engine.proposal_status(id).unwrap(), ProposalStatus::Queued);

    assert_eq!(
        s.engine.execute(id),
        Err(GovernanceError::TimelockNotExpired { eta: Some(eta) })
    );

    s.height.set(eta).unwrap();
    let receipt = s.engine.execute(id).unwrap();
    assert_eq!(receipt.proposal_id, id);
    assert_eq!(receipt.executed_at, eta);
    assert_eq!(s.engine.treasury_balance(), 500);

    let tx = s.engine.treasury_transaction(receipt.transaction_id.unwrap()).unwrap();
    assert_eq!(tx.amount, 500);
    assert_eq!(
        tx.kind,
        TransactionKind::Disbursement {
            proposal_id: id,
            recipient: s.recipient
        }
    );

    assert_eq!(s.engine.execute(id), Err(GovernanceError::AlreadyExecuted));
    assert_eq!(s.engine.queue(id), Err(GovernanceError::AlreadyExecuted));
    assert_eq!(s.engine.proposal_status(id).unwrap(), ProposalStatus::Executed);
    assert_eq!(s.engine.treasury_balance(), 500);
}

#[test]
fn test_expired_proposal_cannot_execute() {
    let s = setup();
    let id = passed_fund_allocation(&s, 500);
    let ends_at = s.engine.proposal(id).unwrap().voting_ends_at;

    s.height.set(ends_at + 1).unwrap();
    let eta = s.engine.queue(id).unwrap();

    s.height.set(eta + 2_016 + 1).unwrap();
    assert_eq!(
        s.engine.execute(id),
        Err(GovernanceError::ProposalExpired { expired_at: eta + 2_016 })
    );
    assert_eq!(s.engine.treasury_balance(), 1_000);
    assert_eq!(s.engine.proposal_status(id).unwrap(), ProposalStatus::Expired);

    // Terminal: cannot be revived by queueing again
    assert_eq!(
        s.engine.queue(id),
        Err(GovernanceError::ProposalExpired { expired_at: eta + 2_016 })
    );
}

#[test]
fn test_execution_at_last_grace_block() {
    let s = setup();
    let id = passed_fund_allocation(&s, 500);
    let ends_at = s.engine.proposal(id).unwrap().voting_ends_at;

    s.height.set(ends_at + 1).unwrap();
    let eta = s.engine.queue(id).unwrap();
    s.height.set(eta + 2_016).unwrap();
    assert!(s.engine.execute(id).is_ok());
}

#[test]
fn test_execution_rechecks_treasury() {
    let s = setup();
    let first = passed_fund_allocation(&s, 800);
    let second = passed_fund_allocation(&s, 800);
    let ends_at = s.engine.proposal(second).unwrap().voting_ends_at;

    s.height.set(ends_at + 1).unwrap();
    s.engine.queue(first).unwrap();
    let eta = s.engine.queue(second).unwrap();
    s.height.set(eta).unwrap();

    s.engine.execute(first).unwrap();
    assert_eq!(
        s.engine.execute(second),
        Err(GovernanceError::TreasuryInsufficientFunds {
            balance: 200,
            requested: 800
        })
    );
    // The failed execution left the proposal unexecuted
    assert!(!s.engine.proposal(second).unwrap().executed);

    s.engine.deposit(test_address(99), 600).unwrap();
    s.engine.execute(second).unwrap();
    assert_eq!(s.engine.treasury_balance(), 0);
}

#[test]
fn test_requeue_resets_eta() {
    let s = setup();
    let id = passed_fund_allocation(&s, 100);
    let ends_at = s.engine.proposal(id).unwrap().voting_ends_at;

    s.height.set(ends_at + 1).unwrap();
    let first_eta = s.engine.queue(id).unwrap();
    s.height.advance(100).unwrap();
    let second_eta = s.engine.queue(id).unwrap();
    assert_eq!(second_eta, first_eta + 100);

    s.height.set(first_eta).unwrap();
    assert_eq!(
        s.engine.execute(id),
        Err(GovernanceError::TimelockNotExpired { eta: Some(second_eta) })
    );
}

#[test]
fn test_single_shot_queue() {
    let height = ManualHeight::new(1);
    let config = GovernanceConfig {
        single_shot_queue: true,
        ..Default::default()
    };
    let engine = GovernanceEngine::new(config, height.clone()).unwrap();
    let whale = test_address(2);
    engine.stake(whale, 20_000_000, 0).unwrap();

    let id = engine
        .create_proposal(whale, ProposalDraft::new("Upgrade", "v2", ProposalType::ProtocolUpgrade))
        .unwrap();
    engine.vote(id, whale, VoteOption::For).unwrap();

    height.set(engine.proposal(id).unwrap().voting_ends_at + 1).unwrap();
    let eta = engine.queue(id).unwrap();
    height.advance(10).unwrap();
    assert_eq!(engine.queue(id), Err(GovernanceError::AlreadyQueued { eta }));

    height.set(eta).unwrap();
    let receipt = engine.execute(id).unwrap();
    assert_eq!(receipt.transaction_id, None);
}

#[test]
fn test_quorum_flips_at_threshold_and_stays() {
    let s = setup();
    let id = s
        .engine
        .create_proposal(s.proposer, ProposalDraft::new("Signal", "", ProposalType::General))
        .unwrap();

    let almost = test_address(10);
    let one = test_address(11);
    let late = test_address(12);
    s.engine.stake(almost, 19_999_999, 0).unwrap();
    s.engine.stake(one, 1, 0).unwrap();
    s.engine.stake(late, 5, 0).unwrap();

    s.engine.vote(id, almost, VoteOption::Against).unwrap();
    let proposal = s.engine.proposal(id).unwrap();
    assert_eq!(proposal.total_votes, 19_999_999);
    assert!(!proposal.quorum_met);

    s.engine.vote(id, one, VoteOption::Abstain).unwrap();
    let proposal = s.engine.proposal(id).unwrap();
    assert_eq!(proposal.total_votes, 20_000_000);
    assert!(proposal.quorum_met);

    s.engine.vote(id, late, VoteOption::For).unwrap();
    assert!(s.engine.proposal(id).unwrap().quorum_met);
}

#[test]
fn test_double_vote_changes_tally_once() {
    let s = setup();
    let id = s
        .engine
        .create_proposal(s.proposer, ProposalDraft::new("Signal", "", ProposalType::General))
        .unwrap();

    let first = s.engine.vote(id, s.whale, VoteOption::For).unwrap();
    let before = s.engine.proposal(id).unwrap();

    assert_eq!(s.engine.vote(id, s.whale, VoteOption::For), Err(GovernanceError::AlreadyVoted));
    assert_eq!(
        s.engine.vote(id, s.whale, VoteOption::Against),
        Err(GovernanceError::AlreadyVoted)
    );

    assert_eq!(s.engine.proposal(id).unwrap(), before);
    assert_eq!(s.engine.vote_record(id, &s.whale), Some(first));
}

#[test]
fn test_vote_rules() {
    let s = setup();
    assert_eq!(
        s.engine.vote(42, s.whale, VoteOption::For),
        Err(GovernanceError::ProposalNotFound(42))
    );

    let id = s
        .engine
        .create_proposal(s.proposer, ProposalDraft::new("Signal", "", ProposalType::General))
        .unwrap();
    let ends_at = s.engine.proposal(id).unwrap().voting_ends_at;

    // Last block of the voting period still counts
    s.height.set(ends_at).unwrap();
    s.engine.vote(id, s.proposer, VoteOption::Against).unwrap();

    s.height.advance(1).unwrap();
    assert_eq!(
        s.engine.vote(id, s.whale, VoteOption::For),
        Err(GovernanceError::VotingPeriodEnded { ends_at })
    );
    assert_eq!(
        s.engine.queue(id),
        Err(GovernanceError::ProposalNotPassed(RejectionReason::QuorumNotMet {
            actual: 1_000_000,
            required: 20_000_000
        }))
    );
    assert_eq!(s.engine.proposal_status(id).unwrap(), ProposalStatus::Rejected);
}

#[test]
fn test_queue_during_voting_period() {
    let s = setup();
    let id = passed_fund_allocation(&s, 10);
    let ends_at = s.engine.proposal(id).unwrap().voting_ends_at;

    s.height.set(ends_at).unwrap();
    assert_eq!(
        s.engine.queue(id),
        Err(GovernanceError::VotingPeriodActive { ends_at })
    );
}

#[test]
fn test_vote_power_is_fixed_at_cast_time() {
    let s = setup();
    let id = s
        .engine
        .create_proposal(s.proposer, ProposalDraft::new("Signal", "", ProposalType::General))
        .unwrap();

    s.engine.vote(id, s.proposer, VoteOption::For).unwrap();
    s.engine.stake(s.proposer, 5_000_000, 0).unwrap();
    s.engine.delegate(s.whale, s.proposer).unwrap();

    let record = s.engine.vote_record(id, &s.proposer).unwrap();
    assert_eq!(record.power, 1_000_000);
    assert_eq!(s.engine.proposal(id).unwrap().votes_for, 1_000_000);
}

#[test]
fn test_delegated_power_is_snapshotted() {
    let s = setup();
    let alice = test_address(20);
    let bob = test_address(21);

    s.engine.stake(alice, 100, 0).unwrap();
    s.engine.delegate(alice, bob).unwrap();
    assert_eq!(s.engine.delegated_power(&bob).total_power, 100);

    // Staking more after delegating does not reach the delegate
    s.engine.stake(alice, 100, 0).unwrap();
    assert_eq!(s.engine.delegated_power(&bob).total_power, 100);
    assert_eq!(s.engine.effective_power(&bob).unwrap(), 100);

    // Revoke then redelegate picks up the current base power
    s.engine.revoke_delegation(alice).unwrap();
    assert_eq!(s.engine.delegated_power(&bob).total_power, 0);
    s.engine.delegate(alice, bob).unwrap();
    assert_eq!(s.engine.delegated_power(&bob).total_power, 200);
    assert_eq!(s.engine.delegated_power(&bob).delegator_count, 1);
}

#[test]
fn test_self_delegation_always_fails() {
    let s = setup();
    let alice = test_address(20);
    assert_eq!(s.engine.delegate(alice, alice), Err(GovernanceError::SelfDelegation));

    s.engine.stake(alice, 1_000, 10_000).unwrap();
    s.engine.delegate(alice, s.whale).unwrap();
    assert_eq!(s.engine.delegate(alice, alice), Err(GovernanceError::SelfDelegation));
    assert_eq!(s.engine.delegated_power(&s.whale).total_power, 1_500);
}

#[test]
fn test_stake_multiplier_boundaries() {
    let s = setup();
    for (n, lock, multiplier) in [(30, 144, 100), (31, 1_008, 110), (32, 4_320, 125), (33, 4_321, 150)] {
        let account = test_address(n);
        let record = s.engine.stake(account, 1_000, lock).unwrap();
        assert_eq!(record.stake_multiplier, multiplier);
        assert_eq!(s.engine.account(&account).locked_until, 1 + lock);
        assert_eq!(s.engine.effective_power(&account).unwrap(), 1_000 * multiplier as u128 / 100);
    }
}

#[test]
fn test_invalid_codes_are_rejected() {
    assert!(matches!(ProposalType::try_from(0u8), Err(GovernanceError::InvalidProposalType(_))));
    assert!(matches!("veto".parse::<VoteOption>(), Err(GovernanceError::InvalidVote(_))));
}

#[test]
fn test_list_proposals() {
    let s = setup();
    let signal = s
        .engine
        .create_proposal(s.proposer, ProposalDraft::new("Signal", "", ProposalType::General))
        .unwrap();
    let grant = passed_fund_allocation(&s, 10);

    s.height.advance(2_000).unwrap();
    let listed = s.engine.list_proposals().unwrap();
    let statuses: Vec<(u64, ProposalStatus)> = listed.iter().map(|(p, st)| (p.id, *st)).collect();
    assert_eq!(
        statuses,
        vec![(signal, ProposalStatus::Rejected), (grant, ProposalStatus::Succeeded)]
    );
}
