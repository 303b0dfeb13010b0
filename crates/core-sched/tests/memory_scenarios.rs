//! Cache-coupled scheduling: strided addresses, primary/secondary miss
//! substates, and memory-event bookkeeping.

mod common;

use common::program;
use core_processor::Processor;
use core_program::Instruction;
use core_sched::{InstrState, Scheduler};

fn load(addr: i64, stride: i64, naccess: u32) -> Instruction {
    Instruction {
        kind: "MEM.L".into(),
        text: format!("ld v, {addr}(+{stride})"),
        destin: "v".into(),
        addr,
        stride,
        naccess,
        ..Instruction::default()
    }
}

fn mem_processor() -> Processor {
    Processor::from_json(
        r#"{
            "name": "mem-test",
            "dispatch": 1,
            "retire": 1,
            "latencies": {"MEM": 1},
            "ports": {"0": ["MEM"]},
            "nBlocks": 2,
            "blkSize": 16,
            "mPenalty": 5,
            "mIssueTime": 2
        }"#,
    )
    .expect("valid processor")
}

#[test]
fn strided_loads_alternate_miss_and_second_miss() {
    let p = program(vec![load(0, 8, 1000)]);
    let mut proc = mem_processor();
    let exec = Scheduler::load(&p, &mut proc, 4, 100)
        .expect("valid configuration")
        .run()
        .expect("run completes");

    // Addresses advance by the stride, one access per iteration.
    let addrs: Vec<Option<i64>> = exec.info.iter().map(|i| i.mem_addr).collect();
    assert_eq!(addrs, vec![Some(0), Some(8), Some(16), Some(24)]);

    // Block size 16: even accesses miss, odd ones coalesce onto the fill in
    // flight.
    assert_eq!(exec.cycles, 12);
    let all_marks: Vec<InstrState> = exec
        .marks
        .iter()
        .flat_map(|row| row.iter().map(|&(_, state)| state))
        .collect();
    assert!(all_marks.contains(&InstrState::WaitCacheMiss));
    assert!(all_marks.contains(&InstrState::WaitCacheSecond));

    let stats = proc.cache.as_ref().expect("cache enabled").statistics(exec.cycles);
    assert!(stats.read_misses >= 2);
    assert_eq!(stats.write_misses, 0);

    // Every primary miss leaves a main-memory completion event.
    assert!(!exec.mem_events.is_empty());
    assert!(exec.mem_events.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn address_counter_wraps_at_naccess() {
    let p = program(vec![load(0, 16, 2)]);
    let mut proc = mem_processor();
    let exec = Scheduler::load(&p, &mut proc, 4, 100)
        .expect("valid configuration")
        .run()
        .expect("run completes");

    let addrs: Vec<Option<i64>> = exec.info.iter().map(|i| i.mem_addr).collect();
    assert_eq!(addrs, vec![Some(0), Some(16), Some(0), Some(16)]);
}

#[test]
fn loads_without_a_cache_pay_no_extra_latency() {
    let p = program(vec![load(0, 8, 1000)]);
    let mut proc = Processor::from_json(
        r#"{
            "name": "no-cache",
            "dispatch": 1,
            "retire": 1,
            "latencies": {"MEM": 1},
            "ports": {"0": ["MEM"]}
        }"#,
    )
    .expect("valid processor");

    let exec = Scheduler::load(&p, &mut proc, 10, 100)
        .expect("valid configuration")
        .run()
        .expect("run completes");
    // Behaves like a plain unit-latency instruction stream.
    assert_eq!(exec.cycles, 13);
    assert!(exec.info.iter().all(|i| i.mem_addr.is_none()));
    assert!(exec.mem_events.is_empty());
}
