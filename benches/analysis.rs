//! Benchmarks for the analyses and the pass pipeline.
//!
//! The input is a generated function made of a chain of diamonds, each
//! storing to memory and storage on both arms and loading after the merge,
//! followed by a counting loop:
//! - CFG and dominator construction
//! - Memory SSA construction for memory and storage
//! - Variable range fixpoint
//! - The full default pipeline

extern crate evmopt;

use std::{fmt::Write, hint::black_box, rc::Rc};

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use evmopt::{
    analysis::{AnalysisManager, CfgAnalysis, DominatorTreeAnalysis, MemoryAliasAnalysis, MemorySsa},
    compiler::{EventLog, PassScheduler, SchedulerConfig},
    ir::{parse_function, AddrSpace, Function},
};

/// Builds `diamonds` chained diamonds followed by a loop counting to 10.
fn diamond_chain(diamonds: usize) -> Function {
    let mut src = String::from("function bench {\nentry:\n    %c = calldataload 0\n    jmp @d0\n");
    for i in 0..diamonds {
        let slot = i % 8;
        let _ = write!(
            src,
            "d{i}:\n    %f{i} = lt %c, {i}\n    jnz %f{i}, @l{i}, @r{i}\n\
             l{i}:\n    mstore {off}, {i}\n    sstore {slot}, %c\n    jmp @m{i}\n\
             r{i}:\n    mstore {off}, %c\n    jmp @m{i}\n\
             m{i}:\n    %v{i} = mload {off}\n    %s{i} = sload {slot}\n    jmp @d{next}\n",
            off = slot * 32,
            next = i + 1,
        );
    }
    let _ = write!(
        src,
        "d{diamonds}:\n    jmp @header\n\
         header:\n    %i = phi @d{diamonds}, 0, @body, %next\n    %done = lt %i, 10\n    jnz %done, @body, @exit\n\
         body:\n    %next = add %i, 1\n    jmp @header\n\
         exit:\n    return 0, 32\n}}\n"
    );
    parse_function(&src).unwrap()
}

fn bench_cfg_and_dominators(c: &mut Criterion) {
    let func = diamond_chain(64);
    c.bench_function("cfg_dominators_64", |b| {
        b.iter(|| {
            let cfg = CfgAnalysis::build(black_box(&func));
            black_box(DominatorTreeAnalysis::build(&cfg))
        });
    });
}

fn bench_memory_ssa(c: &mut Criterion) {
    let func = diamond_chain(64);
    let cfg = CfgAnalysis::build(&func);
    let doms = DominatorTreeAnalysis::build(&cfg);
    for space in [AddrSpace::Memory, AddrSpace::Storage] {
        c.bench_function(&format!("memory_ssa_{space}_64"), |b| {
            b.iter(|| {
                let alias = Rc::new(MemoryAliasAnalysis::build(black_box(&func), space));
                black_box(MemorySsa::build(&func, &cfg, &doms, alias))
            });
        });
    }
}

fn bench_variable_ranges(c: &mut Criterion) {
    let func = diamond_chain(64);
    c.bench_function("variable_ranges_64", |b| {
        b.iter(|| {
            let mut analyses = AnalysisManager::new();
            black_box(analyses.variable_ranges(black_box(&func)))
        });
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let func = diamond_chain(32);
    let scheduler = PassScheduler::with_default_pipeline(SchedulerConfig::new().with_parallel(false));
    c.bench_function("default_pipeline_32", |b| {
        b.iter_batched(
            || func.clone(),
            |mut func| {
                let events = EventLog::new();
                scheduler.run_on_function(&mut func, &events).unwrap();
                black_box(events.len())
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_cfg_and_dominators,
    bench_memory_ssa,
    bench_variable_ranges,
    bench_pipeline
);
criterion_main!(benches);
