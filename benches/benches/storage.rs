use agora_benches::{address, staked_engine};
use agora_governance::{GovernanceSnapshot, ProposalDraft, ProposalType, VoteOption};
use agora_storage::StateFile;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempfile::TempDir;

fn populated_snapshot() -> GovernanceSnapshot {
    let (engine, _) = staked_engine(1_000);
    for p in 0..20u16 {
        let id = engine
            .create_proposal(address(p), ProposalDraft::new(format!("Proposal {p}"), "", ProposalType::General))
            .unwrap();
        for n in 0..50 {
            engine.vote(id, address(100 + n), VoteOption::For).unwrap();
        }
    }
    engine.snapshot()
}

fn bench_state_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage_state_file");
    let temp_dir = TempDir::new().unwrap();
    let file = StateFile::new(temp_dir.path().join("state.json")).unwrap();
    let snapshot = populated_snapshot();

    group.bench_function("save_snapshot", |b| {
        b.iter(|| file.save(black_box(&snapshot)).unwrap())
    });

    file.save(&snapshot).unwrap();
    group.bench_function("load_snapshot", |b| {
        b.iter(|| black_box(file.load::<GovernanceSnapshot>().unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_state_file);
criterion_main!(benches);
