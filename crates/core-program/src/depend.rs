//! Dependence analysis: one forward sweep resolving producers, one fixup
//! sweep for loop-carried values, then cyclic-path enumeration over the
//! reverse (producer → consumer) graph.

use crate::{Dependence, Instruction};

// Producer sentinels used only inside the forward sweep.
const PENDING: i64 = -2;
const CONSTANT: i64 = -1;
const READ_ONLY: i64 = -3;

pub(crate) struct Tables {
    pub variables: Vec<String>,
    pub constants: Vec<String>,
    pub read_only: Vec<String>,
    pub loop_carried: Vec<(usize, String)>,
    pub dependences: Vec<Vec<Dependence>>,
    pub dep_offsets: Vec<Vec<usize>>,
    pub cyclic_paths: Vec<Vec<usize>>,
    pub cyclic_members: Vec<usize>,
}

fn push_unique<T: PartialEq + Clone>(list: &mut Vec<T>, value: &T) {
    if !list.contains(value) {
        list.push(value.clone());
    }
}

pub(crate) fn analyze(instructions: &[Instruction]) -> Tables {
    let n = instructions.len();

    // Symbol tables in first-appearance order, destinations before sources.
    let mut outputs: Vec<String> = Vec::new();
    let mut variables: Vec<String> = Vec::new();
    let mut constants: Vec<String> = Vec::new();
    for instr in instructions {
        if !instr.destin.is_empty() {
            push_unique(&mut outputs, &instr.destin);
            push_unique(&mut variables, &instr.destin);
        }
    }
    for instr in instructions {
        for src in instr.sources() {
            if !src.is_empty() {
                push_unique(&mut variables, &src.to_owned());
            }
        }
    }
    for instr in instructions {
        if !instr.constant.is_empty() && !variables.contains(&instr.constant) {
            push_unique(&mut constants, &instr.constant);
        }
    }

    // Forward sweep: record each operand against the most recent producer of
    // its symbol; destinations update the producer table afterwards, so a
    // self-referencing instruction depends on the previous iteration's write.
    let mut producers: Vec<i64> = vec![PENDING; outputs.len()];
    let mut raw: Vec<Vec<(i64, usize)>> = Vec::with_capacity(n);
    let mut read_only: Vec<String> = Vec::new();

    for (i, instr) in instructions.iter().enumerate() {
        let mut deps: Vec<(i64, usize)> = Vec::new();

        if !instr.constant.is_empty() {
            match constants.iter().position(|c| *c == instr.constant) {
                Some(idx) => deps.push((CONSTANT, idx)),
                // A constant literal shadowed by a variable name; the operand
                // is already covered by the source fields.
                None => tracing::warn!(
                    target: "program.depend",
                    instr = i,
                    literal = %instr.constant,
                    "constant shadowed by variable, ignored"
                ),
            }
        }

        for src in instr.sources() {
            if src.is_empty() {
                continue;
            }
            let var_idx = variables
                .iter()
                .position(|v| v == src)
                .expect("sources are registered variables");
            match outputs.iter().position(|o| o == src) {
                Some(out_idx) => deps.push((producers[out_idx], var_idx)),
                None => {
                    push_unique(&mut read_only, &src.to_owned());
                    deps.push((READ_ONLY, var_idx));
                }
            }
        }

        if !instr.destin.is_empty() {
            let out_idx = outputs
                .iter()
                .position(|o| *o == instr.destin)
                .expect("destinations are registered outputs");
            producers[out_idx] = i as i64;
        }
        raw.push(deps);
    }

    // Fixup sweep: operands read before any producer ran are loop-carried and
    // resolve to the last writer in the loop body.
    let mut loop_carried: Vec<(usize, String)> = Vec::new();
    for deps in &mut raw {
        for dep in deps.iter_mut() {
            if dep.0 == PENDING {
                let name = variables[dep.1].clone();
                let out_idx = outputs
                    .iter()
                    .position(|o| *o == name)
                    .expect("pending operands name an output");
                let producer = producers[out_idx];
                debug_assert!(producer >= 0, "every output has a final producer");
                dep.0 = producer;
                push_unique(&mut loop_carried, &(producer as usize, name));
            }
        }
    }

    let dependences: Vec<Vec<Dependence>> = raw
        .iter()
        .map(|deps| {
            deps.iter()
                .map(|&(producer, idx)| match producer {
                    CONSTANT => Dependence::Constant { index: idx },
                    READ_ONLY => Dependence::ReadOnly { variable: idx },
                    p => Dependence::Data {
                        producer: p as usize,
                        variable: idx,
                    },
                })
                .collect()
        })
        .collect();

    // Positive dynamic distances: intra-iteration producers are `i - p`
    // behind, loop-carried producers one full iteration further.
    let mut dep_offsets: Vec<Vec<usize>> = Vec::with_capacity(n);
    for (i, deps) in dependences.iter().enumerate() {
        let offsets = deps
            .iter()
            .filter_map(|dep| match *dep {
                Dependence::Data { producer, .. } => {
                    Some(if producer >= i { i + n - producer } else { i - producer })
                }
                _ => None,
            })
            .collect();
        dep_offsets.push(offsets);
    }

    let cyclic_paths = enumerate_cycles(n, &dependences);
    let mut cyclic_members: Vec<usize> = Vec::new();
    for path in &cyclic_paths {
        for &id in path {
            push_unique(&mut cyclic_members, &id);
        }
    }

    Tables {
        variables,
        constants,
        read_only,
        loop_carried,
        dependences,
        dep_offsets,
        cyclic_paths,
        cyclic_members,
    }
}

/// Enumerate simple cyclic dependence paths. Start nodes are instructions
/// with no dependence on a strictly earlier instruction; the walk follows the
/// producer → consumer direction and records a minimal cycle whenever it
/// revisits an edge while the current path repeats a vertex.
fn enumerate_cycles(n: usize, dependences: &[Vec<Dependence>]) -> Vec<Vec<usize>> {
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut starts: Vec<usize> = Vec::new();

    for i in 0..n {
        let mut earlier = false;
        for dep in &dependences[i] {
            if let Dependence::Data { producer, .. } = *dep {
                successors[producer].push(i);
                if producer < i {
                    earlier = true;
                }
            }
        }
        if !earlier {
            starts.push(i);
        }
    }

    let mut cycles: Vec<Vec<usize>> = Vec::new();
    let mut stack: Vec<Vec<usize>> = starts.iter().map(|&i| vec![i]).collect();
    let mut visited: Vec<Vec<usize>> = vec![Vec::new(); n];

    while let Some(mut path) = stack.pop() {
        let last = *path.last().expect("paths are non-empty");
        for &next in &successors[last] {
            if !visited[last].contains(&next) {
                visited[last].push(next);
                let mut extended = path.clone();
                extended.push(next);
                stack.push(extended);
            } else if has_repeat(&path) {
                // Truncate at the first occurrence of the tail vertex: that
                // suffix is the closed walk.
                let pos = path
                    .iter()
                    .position(|&v| v == last)
                    .expect("tail vertex occurs in path");
                path.drain(..pos);
                if !cycles.contains(&path) {
                    cycles.push(path.clone());
                }
            }
        }
    }

    cycles
        .into_iter()
        .map(|mut cycle| {
            cycle.pop();
            let min_pos = cycle
                .iter()
                .enumerate()
                .min_by_key(|&(_, v)| *v)
                .map(|(pos, _)| pos)
                .expect("cycles are non-empty");
            let mut rotated: Vec<usize> = Vec::with_capacity(cycle.len() + 1);
            rotated.extend_from_slice(&cycle[min_pos..]);
            rotated.extend_from_slice(&cycle[..min_pos]);
            rotated.push(cycle[min_pos]);
            rotated
        })
        .collect()
}

fn has_repeat(path: &[usize]) -> bool {
    for (i, v) in path.iter().enumerate() {
        if path[i + 1..].contains(v) {
            return true;
        }
    }
    false
}
