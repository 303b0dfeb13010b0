#![allow(dead_code)] // Shared across the integration tests; each binary uses a subset.

//! Shared builders for scheduler tests.

use core_processor::Processor;
use core_program::{Instruction, Program};

pub fn instr(kind: &str, destin: &str, s1: &str, s2: &str, constant: &str) -> Instruction {
    Instruction {
        kind: kind.into(),
        text: format!("{destin} <- {s1} {s2} {constant}").trim_end().into(),
        destin: destin.into(),
        source1: s1.into(),
        source2: s2.into(),
        constant: constant.into(),
        ..Instruction::default()
    }
}

pub fn program(instructions: Vec<Instruction>) -> Program {
    Program::from_instructions("sched-test".into(), instructions)
}

/// Processor with unit latencies for the named types and no cache.
pub fn processor(dispatch: u32, retire: u32, sched: &str, latencies: &str, ports: &str) -> Processor {
    let text = format!(
        r#"{{
            "name": "sched-test",
            "dispatch": {dispatch},
            "retire": {retire},
            "latencies": {latencies},
            "ports": {ports},
            "sched": "{sched}"
        }}"#
    );
    Processor::from_json(&text).expect("valid processor")
}
