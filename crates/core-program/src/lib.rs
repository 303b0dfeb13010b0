//! core-program: static loop programs and their dependence structure.
//!
//! A `Program` is a fixed ordered list of instructions with symbolic
//! destination/source operands and a hierarchical type tag. Loading a program
//! derives, once and immutably:
//! * the variable / constant / read-only symbol tables,
//! * per-instruction dependence records (`Dependence`),
//! * the dependence offsets consumed by the dynamic scheduler,
//! * all simple cyclic dependence paths (loop recurrences).
//!
//! Producers are plain integer indices into the instruction list, so there
//! are no pointer cycles; forward (`dependences`) and reverse (successor)
//! adjacency are both rebuilt from them on demand.

mod depend;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the program loader. The dependence analyzer itself is
/// total: unresolved sources are classified read-only, never rejected.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("malformed program source: {0}")]
    MalformedSource(#[from] serde_json::Error),
    #[error("instruction count mismatch: n={declared} but the list has {actual}")]
    CountMismatch { declared: usize, actual: usize },
}

/// Memory classification of a static instruction, derived from its type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemKind {
    None,
    Load,
    Store,
}

fn default_naccess() -> u32 {
    1
}

/// One static instruction. Symbols are opaque identifiers compared by
/// equality; the empty string means "absent". The optional `addr`/`stride`/
/// `naccess` fields describe the per-iteration memory trace of loads and
/// stores (the address wraps back to `addr` after `naccess` accesses).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub destin: String,
    #[serde(default)]
    pub source1: String,
    #[serde(default)]
    pub source2: String,
    #[serde(default)]
    pub source3: String,
    #[serde(default)]
    pub constant: String,
    #[serde(default)]
    pub addr: i64,
    #[serde(default)]
    pub stride: i64,
    #[serde(default = "default_naccess")]
    pub naccess: u32,
}

impl Instruction {
    pub fn sources(&self) -> [&str; 3] {
        [&self.source1, &self.source2, &self.source3]
    }

    /// Loads are `MEM.L` and descendants, stores `MEM.S` and descendants,
    /// case-insensitive. Everything else is not a memory operation.
    pub fn mem_kind(&self) -> MemKind {
        let kind = self.kind.to_ascii_uppercase();
        if kind == "MEM.L" || kind.starts_with("MEM.L.") {
            MemKind::Load
        } else if kind == "MEM.S" || kind.starts_with("MEM.S.") {
            MemKind::Store
        } else {
            MemKind::None
        }
    }
}

/// One input dependence of an instruction. Indices point into the program's
/// `constants` / `variables` tables and instruction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependence {
    /// The operand is a constant literal.
    Constant { index: usize },
    /// The operand is a variable read but never written in the loop body.
    ReadOnly { variable: usize },
    /// The operand is produced by `producer`. `producer >= consumer` means the
    /// value crosses the loop boundary (loop-carried).
    Data { producer: usize, variable: usize },
}

/// On-disk shape: `{name, n, instruction_list}`.
#[derive(Serialize, Deserialize)]
struct ProgramSource {
    #[serde(default)]
    name: String,
    #[serde(default)]
    n: usize,
    #[serde(default)]
    instruction_list: Vec<Instruction>,
}

/// A loaded loop program with all derived dependence tables. Immutable after
/// `from_json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub name: String,
    pub instructions: Vec<Instruction>,
    /// Symbols appearing as destination or source, first-appearance order
    /// (destinations before sources).
    pub variables: Vec<String>,
    /// Constant literals that are not shadowed by a variable.
    pub constants: Vec<String>,
    /// Variables read but never written in the loop body.
    pub read_only: Vec<String>,
    /// `(producer_index, variable)` pairs whose value crosses the loop
    /// boundary.
    pub loop_carried: Vec<(usize, String)>,
    /// Per-instruction input dependences, operand order.
    pub dependences: Vec<Vec<Dependence>>,
    /// Per-instruction positive dynamic-distance offsets: instruction `i`
    /// depends on the dynamic instruction at position `i - k` for each `k`.
    pub dep_offsets: Vec<Vec<usize>>,
    /// Simple cycles, rotated to start at their minimum index and closed by
    /// repeating the start index at the end.
    pub cyclic_paths: Vec<Vec<usize>>,
    /// Union of all cyclic-path members, deduplicated.
    pub cyclic_members: Vec<usize>,
}

impl Program {
    /// Parse a JSON program source and run the dependence analysis.
    pub fn from_json(text: &str) -> Result<Self, ProgramError> {
        let src: ProgramSource = serde_json::from_str(text)?;
        if src.n != src.instruction_list.len() {
            return Err(ProgramError::CountMismatch {
                declared: src.n,
                actual: src.instruction_list.len(),
            });
        }
        Ok(Self::from_instructions(src.name, src.instruction_list))
    }

    /// Build a program from already-decoded instructions (used by tests and
    /// by front-ends that assemble instructions themselves).
    pub fn from_instructions(name: String, instructions: Vec<Instruction>) -> Self {
        let tables = depend::analyze(&instructions);
        tracing::debug!(
            target: "program.depend",
            n = instructions.len(),
            variables = tables.variables.len(),
            cycles = tables.cyclic_paths.len(),
            "program analyzed"
        );
        Program {
            name,
            instructions,
            variables: tables.variables,
            constants: tables.constants,
            read_only: tables.read_only,
            loop_carried: tables.loop_carried,
            dependences: tables.dependences,
            dep_offsets: tables.dep_offsets,
            cyclic_paths: tables.cyclic_paths,
            cyclic_members: tables.cyclic_members,
        }
    }

    /// Emit the JSON source form. `from_json(to_json())` reproduces the
    /// program field-by-field.
    pub fn to_json(&self) -> String {
        let src = ProgramSource {
            name: self.name.clone(),
            n: self.instructions.len(),
            instruction_list: self.instructions.clone(),
        };
        serde_json::to_string_pretty(&src).expect("program source serializes")
    }

    /// Number of static instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Static instruction backing the dynamic position `idx`.
    pub fn instr(&self, idx: usize) -> &Instruction {
        &self.instructions[idx % self.instructions.len()]
    }
}
