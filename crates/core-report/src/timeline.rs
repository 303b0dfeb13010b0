//! The execution timeline matrix: one row per dynamic instruction with a
//! state letter per cycle (`D E W R * - . ! 2`), port-usage and main-memory
//! rows above, and the dynamic critical path overlaid in red. Alignment is
//! two characters per cycle; rows of one iteration share a left margin so
//! the loop structure stays visible.

use core_processor::Processor;
use core_program::Program;
use core_sched::{Execution, InstrState};
use crossterm::style::Stylize;
use std::fmt::Write as _;

/// Critical-path entries, consumed from the earliest node upwards as rows
/// are rendered in dynamic order.
struct Overlay<'a> {
    path: &'a [(usize, i64)],
    remaining: usize,
}

impl<'a> Overlay<'a> {
    fn new(path: &'a [(usize, i64)]) -> Self {
        Overlay {
            path,
            remaining: path.len(),
        }
    }

    fn take(&mut self, dyn_idx: usize, stage: usize) -> Option<i64> {
        let (node, weight) = *self.path.get(self.remaining.checked_sub(1)?)?;
        if node / 3 == dyn_idx && node % 3 == stage {
            self.remaining -= 1;
            Some(weight)
        } else {
            None
        }
    }
}

fn paint(cell: String, hot: bool) -> String {
    if hot { format!("{}", cell.red()) } else { cell }
}

/// Render one row's state letters, applying the critical-path overlay for
/// this dynamic instruction. Dispatch and retire cells are hot only when
/// their path weight is one full cycle; execute cells are hot for as many
/// cycles as the path attributes to this instruction.
fn row_states(letters: &[InstrState], dyn_idx: usize, overlay: &mut Overlay) -> String {
    let mut out = String::new();
    let mut idx = 0;

    let dispatch_hot = overlay.take(dyn_idx, 0).map(|w| w == 1).unwrap_or(false);
    out += &paint(format!("{} ", letters[0].letter()), dispatch_hot);
    idx += 1;
    while idx < letters.len() && letters[idx] == InstrState::WaitData {
        let _ = write!(out, "{} ", letters[idx].letter());
        idx += 1;
    }

    let mut hot_cycles = overlay.take(dyn_idx, 1).unwrap_or(0);
    while idx < letters.len() && letters[idx] != InstrState::Retire {
        out += &paint(format!("{} ", letters[idx].letter()), hot_cycles > 0);
        hot_cycles -= 1;
        idx += 1;
    }

    let retire_hot = overlay.take(dyn_idx, 2).map(|w| w == 1).unwrap_or(false);
    out += &paint("R ".to_string(), retire_hot);
    out
}

pub fn timeline(program: &Program, processor: &Processor, execution: &Execution) -> String {
    let n = program.len().max(1);
    let total = execution.total_instructions;
    let cycles = execution.cycles as usize;
    let pad_iter = execution.iterations.max(1).to_string().len();
    let pad_i = program.len().to_string().len();
    let label_pad = pad_iter + pad_i + 5;
    let id_pad = pad_iter + pad_i + 2;

    let header: String = (0..cycles)
        .map(|c| (c % 10).to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let mut out = format!("{:label_pad$}{header}\n", "");

    for (idx, port) in processor.ports.iter().enumerate() {
        let usage: String = execution.port_timeline[idx]
            .iter()
            .map(|&used| if used { "X" } else { " " })
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "P.{:<id_pad$} {usage}", port.id);
    }

    let mut mm_row = String::from("  ");
    let mut cursor: i64 = 0;
    for &event in &execution.mem_events {
        if event >= cycles as i64 {
            break;
        }
        mm_row += &"  ".repeat((event - cursor - 1).max(0) as usize);
        mm_row += "# ";
        cursor = event;
    }
    let _ = writeln!(out, "{:<id_pad$}   {mm_row}", "MM");
    let _ = write!(out, "\n{:label_pad$}{header}\n", "");

    // Rows of one iteration share a margin: it starts one cycle before the
    // iteration's first dispatch and ends at its last recorded mark.
    let mut groups: Vec<(usize, usize)> = Vec::new();
    for i in 0..total {
        let marks = &execution.marks[i];
        if marks.is_empty() {
            break;
        }
        let first_cycle = marks[0].0 as usize;
        if i % n == 0 {
            groups.push((first_cycle, 0));
        }
        let iteration = i / n;
        groups[iteration].1 = first_cycle + marks.len();
    }

    let mut overlay = Overlay::new(&execution.critical_path);

    for i in 0..total {
        let marks = &execution.marks[i];
        if marks.is_empty() {
            break;
        }
        let iteration = i / n;
        let idx = i % n;
        let first_cycle = marks[0].0 as usize;
        let init_pad = groups[iteration].0.saturating_sub(1);
        let medium_pad = first_cycle - init_pad;
        let end_pad = groups[iteration]
            .1
            .saturating_sub(marks.len() + init_pad + medium_pad);

        let letters: Vec<InstrState> = marks.iter().map(|&(_, state)| state).collect();
        let states = row_states(&letters, i, &mut overlay);

        let _ = write!(
            out,
            "{}[{iteration:pad_iter$},{idx:pad_i$}]{}{states}{}     {}",
            "  ".repeat(init_pad),
            "  ".repeat(medium_pad),
            "  ".repeat(end_pad),
            program.instructions[idx].text
        );

        match execution.info[i].port {
            Some(port) => {
                let _ = write!(out, " (P.{})", processor.ports[port].id);
            }
            None => out.push_str(" (P.-)"),
        }
        if iteration == 0 {
            let _ = write!(out, " {}", program.instructions[idx].kind);
        }
        if let Some(addr) = execution.info[i].mem_addr {
            let _ = write!(out, " [Addr= {addr}]");
        }
        out.push('\n');
    }

    out
}
