//! Dependence-table invariants: operand classification, producer
//! resolution, offsets, and the multiple-writer rule.

use core_program::{Dependence, Instruction, Program};

fn instr(kind: &str, destin: &str, sources: [&str; 3], constant: &str) -> Instruction {
    Instruction {
        kind: kind.into(),
        text: format!("{destin} <- {sources:?}"),
        destin: destin.into(),
        source1: sources[0].into(),
        source2: sources[1].into(),
        source3: sources[2].into(),
        constant: constant.into(),
        ..Instruction::default()
    }
}

fn load(instructions: Vec<Instruction>) -> Program {
    Program::from_instructions("deps".into(), instructions)
}

#[test]
fn every_source_classifies_exactly_once() {
    let p = load(vec![
        instr("ARITH", "acc", ["acc", "in", ""], "4"),
        instr("ARITH", "out", ["acc", "bias", ""], ""),
    ]);

    // Written symbols are variables with a producer, never read-only.
    assert!(p.variables.contains(&"acc".to_string()));
    assert!(!p.read_only.contains(&"acc".to_string()));
    // Pure inputs are read-only variables.
    assert_eq!(p.read_only, vec!["in".to_string(), "bias".to_string()]);
    // Constant literals live in their own table.
    assert_eq!(p.constants, vec!["4".to_string()]);
    for name in &p.read_only {
        assert!(!p.constants.contains(name));
        assert!(p.variables.contains(name));
    }
}

#[test]
fn offsets_count_only_data_dependences() {
    let p = load(vec![
        instr("ARITH", "acc", ["acc", "in", ""], "4"),
        instr("ARITH", "out", ["acc", "bias", ""], ""),
    ]);

    for (deps, offsets) in p.dependences.iter().zip(&p.dep_offsets) {
        let data = deps
            .iter()
            .filter(|d| matches!(d, Dependence::Data { .. }))
            .count();
        assert_eq!(data, offsets.len());
        assert!(offsets.iter().all(|&k| k > 0));
    }
    // acc is loop-carried into instruction 0 (offset n) and intra-iteration
    // into instruction 1 (offset 1).
    assert_eq!(p.dep_offsets[0], vec![2]);
    assert_eq!(p.dep_offsets[1], vec![1]);
}

#[test]
fn loop_carried_resolves_to_last_writer() {
    // `t` is written twice; the consumer in the next iteration must see the
    // later write, and the intra-iteration reader the most recent one.
    let p = load(vec![
        instr("ARITH", "t", ["t", "", ""], ""),
        instr("ARITH", "t", ["t", "", ""], ""),
        instr("ARITH", "u", ["t", "", ""], ""),
    ]);

    // Instruction 0 reads last iteration's final write (instruction 1).
    assert_eq!(
        p.dependences[0],
        vec![Dependence::Data {
            producer: 1,
            variable: 0
        }]
    );
    // Instruction 1 reads this iteration's write from instruction 0.
    assert_eq!(
        p.dependences[1],
        vec![Dependence::Data {
            producer: 0,
            variable: 0
        }]
    );
    // Instruction 2 reads the most recent write (instruction 1).
    assert_eq!(
        p.dependences[2],
        vec![Dependence::Data {
            producer: 1,
            variable: 0
        }]
    );
    assert_eq!(p.loop_carried, vec![(1, "t".to_string())]);
}

#[test]
fn unresolved_sources_become_read_only() {
    // No instruction writes `ghost`; the analyzer must classify it instead
    // of failing.
    let p = load(vec![instr("ARITH", "x", ["ghost", "", ""], "")]);
    assert_eq!(p.read_only, vec!["ghost".to_string()]);
    assert!(matches!(
        p.dependences[0][0],
        Dependence::ReadOnly { variable: _ }
    ));
    assert!(p.dep_offsets[0].is_empty());
}

#[test]
fn empty_operands_are_ignored() {
    let p = load(vec![instr("ARITH", "", ["", "", ""], "")]);
    assert!(p.variables.is_empty());
    assert!(p.constants.is_empty());
    assert!(p.dependences[0].is_empty());
}
