use agora_benches::{address, staked_engine};
use agora_governance::{ProposalDraft, ProposalType, VoteOption};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

fn bench_voting(c: &mut Criterion) {
    let mut group = c.benchmark_group("governance_voting");

    group.bench_function("cast_1k_votes", |b| {
        b.iter_batched(
            || {
                let (engine, _) = staked_engine(1_000);
                let id = engine
                    .create_proposal(address(0), ProposalDraft::new("Bench", "", ProposalType::General))
                    .unwrap();
                (engine, id)
            },
            |(engine, id)| {
                for n in 0..1_000 {
                    let option = if n % 3 == 0 { VoteOption::Against } else { VoteOption::For };
                    engine.vote(id, address(n), option).unwrap();
                }
                black_box(engine.proposal(id).unwrap().total_votes);
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_delegation(c: &mut Criterion) {
    let mut group = c.benchmark_group("governance_delegation");

    group.bench_function("redelegate_1k", |b| {
        b.iter_batched(
            || staked_engine(1_000).0,
            |engine| {
                for n in 2..1_000 {
                    engine.delegate(address(n), address(n % 2)).unwrap();
                }
                black_box(engine.delegated_power(&address(0)));
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("governance_lifecycle");

    group.bench_function("propose_vote_queue_execute", |b| {
        b.iter_batched(
            || {
                let (engine, height) = staked_engine(30);
                engine.deposit(address(0), 10_000).unwrap();
                (engine, height)
            },
            |(engine, height)| {
                let draft = ProposalDraft::fund_allocation("Grant", "", address(99), 500);
                let id = engine.create_proposal(address(0), draft).unwrap();
                for n in 0..30 {
                    engine.vote(id, address(n), VoteOption::For).unwrap();
                }
                height.advance(1_009).unwrap();
                let eta = engine.queue(id).unwrap();
                height.set(eta).unwrap();
                black_box(engine.execute(id).unwrap());
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_voting, bench_delegation, bench_lifecycle);
criterion_main!(benches);
