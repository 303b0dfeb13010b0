//! Cyclic-path enumeration: normalization, simple-path interiors, and the
//! member table.

use core_program::{Instruction, Program};

fn instr(destin: &str, s1: &str, s2: &str) -> Instruction {
    Instruction {
        kind: "ARITH".into(),
        text: format!("{destin} <- {s1},{s2}"),
        destin: destin.into(),
        source1: s1.into(),
        source2: s2.into(),
        ..Instruction::default()
    }
}

fn load(instructions: Vec<Instruction>) -> Program {
    Program::from_instructions("cycles".into(), instructions)
}

#[test]
fn self_dependence_yields_unit_cycle() {
    let p = load(vec![instr("a", "a", "")]);
    assert_eq!(p.cyclic_paths, vec![vec![0, 0]]);
    assert_eq!(p.cyclic_members, vec![0]);
}

#[test]
fn mutual_pair_normalizes_to_minimum_start() {
    let p = load(vec![instr("x", "x", "y"), instr("y", "x", "")]);
    assert!(p.cyclic_paths.contains(&vec![0, 1, 0]));
    assert!(p.cyclic_paths.contains(&vec![0, 0]));
    assert_eq!(p.cyclic_members, vec![0, 1]);
}

#[test]
fn chains_produce_no_cycles() {
    let p = load(vec![
        instr("b", "a", ""),
        instr("c", "b", ""),
        instr("d", "c", ""),
    ]);
    assert!(p.cyclic_paths.is_empty());
    assert!(p.cyclic_members.is_empty());
}

#[test]
fn every_path_is_closed_and_simple() {
    let p = load(vec![
        instr("a", "b", ""),
        instr("b", "c", ""),
        instr("c", "a", "c"),
    ]);
    assert!(!p.cyclic_paths.is_empty());
    for path in &p.cyclic_paths {
        assert!(path.len() >= 2);
        assert_eq!(path.first(), path.last(), "closed walk");
        let min = path.iter().min().copied();
        assert_eq!(path.first().copied(), min, "starts at minimum index");
        // Interior vertices are distinct.
        let interior = &path[..path.len() - 1];
        for (i, v) in interior.iter().enumerate() {
            assert!(!interior[i + 1..].contains(v), "simple interior");
        }
    }
}

#[test]
fn disjoint_recurrences_are_both_found() {
    let p = load(vec![
        instr("a", "a", ""),
        instr("q", "r", ""),
        instr("b", "b", ""),
    ]);
    assert!(p.cyclic_paths.contains(&vec![0, 0]));
    assert!(p.cyclic_paths.contains(&vec![2, 2]));
    assert!(!p.cyclic_members.contains(&1));
}
