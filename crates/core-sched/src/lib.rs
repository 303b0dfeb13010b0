//! core-sched: the cycle-accurate reorder-window scheduler.
//!
//! `Scheduler::load` binds a program to a processor, resets cache state and
//! sizes the window; `run` advances integer cycles until every requested
//! dynamic instruction has retired, building the execution graph in parallel
//! and returning an `Execution` with the timeline, port usage, memory events
//! and the dynamic critical path.
//!
//! Everything is single-threaded and deterministic: the per-cycle passes run
//! in a fixed order (retire/write-back, dispatch readiness, port assignment,
//! dispatch-in) and iterate the window oldest to newest, so identical inputs
//! produce identical timelines.

mod graph;
mod ports;
mod window;

pub use graph::{CriticalPath, ExecutionGraph};
pub use ports::{Candidate, assign_optimal};
pub use window::{InstrInstance, InstrState, ReorderWindow, WindowOverflow};

use core_processor::{AccessKind, Processor, SchedKind};
use core_program::{MemKind, Program};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    WindowOverflow(#[from] WindowOverflow),
    #[error("no forward progress for two consecutive cycles at cycle {cycle}")]
    Deadlock { cycle: u64 },
}

/// Facts recorded when a dynamic instruction retires.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetireInfo {
    pub exec_cycle: u64,
    pub port: Option<usize>,
    pub mem_addr: Option<i64>,
}

/// Everything a finished run exposes to reporting.
#[derive(Debug)]
pub struct Execution {
    pub iterations: usize,
    pub total_instructions: usize,
    pub cycles: u64,
    /// Busy cycles per port.
    pub port_usage: Vec<u64>,
    /// Per-port, per-cycle busy flags.
    pub port_timeline: Vec<Vec<bool>>,
    /// Completion cycles of main-memory transactions (shifted by one for the
    /// timeline row, matching the memory bus settling after the access).
    pub mem_events: Vec<i64>,
    /// Per dynamic instruction: `(cycle, state-letter)` marks from dispatch
    /// to retirement.
    pub marks: Vec<Vec<(u64, InstrState)>>,
    pub info: Vec<RetireInfo>,
    /// `(node, weight)` entries from the final retire back to the first
    /// dispatch.
    pub critical_path: Vec<(usize, i64)>,
}

impl Execution {
    pub fn ipc(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.total_instructions as f64 / self.cycles as f64
        }
    }

    pub fn cycles_per_iteration(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.cycles as f64 / self.iterations as f64
        }
    }
}

/// Per-static-instruction memory stride cursor. The program itself stays
/// immutable; the scheduler owns the only mutable trace state.
#[derive(Debug, Clone, Copy)]
struct MemCursor {
    next_addr: i64,
    count: u32,
}

struct CycleOutcome {
    retires: usize,
    used_ports: Vec<bool>,
    mem_event: Option<i64>,
}

pub struct Scheduler<'a> {
    program: &'a Program,
    processor: &'a mut Processor,
    iterations: usize,
    window_size: usize,
    total: usize,
    window: ReorderWindow,
    pc: usize,
    cycles: u64,
    mem: Vec<MemCursor>,
}

impl<'a> Scheduler<'a> {
    /// Bind a program and processor for one run. Takes the processor
    /// exclusively and resets it (clearing cache state); re-entrant
    /// scheduling is not supported.
    pub fn load(
        program: &'a Program,
        processor: &'a mut Processor,
        iterations: usize,
        window_size: usize,
    ) -> Result<Self, SchedError> {
        if window_size == 0 {
            return Err(SchedError::Configuration(
                "window size must be at least 1".into(),
            ));
        }
        if processor.n_ports() == 0 {
            return Err(SchedError::Configuration("the port table is empty".into()));
        }
        if processor.dispatch_width == 0
            || processor.execute_width == 0
            || processor.retire_width == 0
        {
            return Err(SchedError::Configuration(
                "dispatch, execute and retire widths must be nonzero".into(),
            ));
        }
        processor.reset();
        let mem = program
            .instructions
            .iter()
            .map(|instr| MemCursor {
                next_addr: instr.addr,
                count: 0,
            })
            .collect();
        let total = iterations * program.len();
        Ok(Scheduler {
            program,
            processor,
            iterations,
            window_size,
            total,
            window: ReorderWindow::new(window_size),
            pc: 0,
            cycles: 0,
            mem,
        })
    }

    /// Drive the machine until `iterations × n` instructions have retired.
    pub fn run(mut self) -> Result<Execution, SchedError> {
        let n_ports = self.processor.n_ports();
        let mut graph = ExecutionGraph::build(
            self.total,
            self.window_size,
            self.program.len().max(1),
            &self.program.dep_offsets,
        );

        let mut retired_total = 0usize;
        let mut last_disp_cycle = 0u64;
        let mut last_ret_cycle = 0u64;
        let mut port_usage = vec![0u64; n_ports];
        let mut port_timeline: Vec<Vec<bool>> = vec![Vec::new(); n_ports];
        let mut mem_events: Vec<i64> = Vec::new();
        let mut marks: Vec<Vec<(u64, InstrState)>> = vec![Vec::new(); self.total];
        let mut info: Vec<RetireInfo> = vec![RetireInfo::default(); self.total];

        let mut fingerprint: Vec<(usize, InstrState, InstrState, u64)> = Vec::new();
        let mut stalled_cycles = 0u32;

        while retired_total < self.total {
            let outcome = self.next_cycle();

            if let Some(event) = outcome.mem_event {
                mem_events.push(event + 1);
            }
            for (port, &used) in outcome.used_ports.iter().enumerate() {
                port_timeline[port].push(used);
                if used {
                    port_usage[port] += 1;
                }
            }

            for pos in 0..outcome.retires {
                let inst = self.window.at(pos);
                debug_assert_eq!(inst.dyn_idx, retired_total, "in-order retirement");

                let disp_latency = inst.disp_cycle as i64 - last_disp_cycle as i64;
                last_disp_cycle = inst.disp_cycle;
                let ret_latency = self.cycles as i64 - last_ret_cycle as i64;
                last_ret_cycle = self.cycles;

                info[inst.dyn_idx] = RetireInfo {
                    exec_cycle: inst.exec_cycle,
                    port: inst.port,
                    mem_addr: inst.mem_addr,
                };
                marks[inst.dyn_idx].push((self.cycles, InstrState::Retire));
                graph.record_retire(inst.dyn_idx, disp_latency, inst.exec_lat, ret_latency);

                retired_total += 1;
                if retired_total >= self.total {
                    break;
                }
            }

            self.window.pop(outcome.retires);
            self.dispatch_in()?;

            for inst in self.window.iter() {
                if inst.dyn_idx < self.total {
                    let mark = if inst.substate != InstrState::None {
                        inst.substate
                    } else {
                        inst.state
                    };
                    marks[inst.dyn_idx].push((self.cycles, mark));
                }
            }

            let snapshot: Vec<(usize, InstrState, InstrState, u64)> = self
                .window
                .iter()
                .map(|i| (i.dyn_idx, i.state, i.substate, i.remaining))
                .collect();
            if outcome.retires == 0 && snapshot == fingerprint {
                stalled_cycles += 1;
                if stalled_cycles >= 2 {
                    return Err(SchedError::Deadlock { cycle: self.cycles });
                }
            } else {
                stalled_cycles = 0;
            }
            fingerprint = snapshot;
        }

        tracing::debug!(
            target: "sched.cycle",
            cycles = self.cycles,
            retired = retired_total,
            "run complete"
        );

        Ok(Execution {
            iterations: self.iterations,
            total_instructions: self.total,
            cycles: self.cycles,
            port_usage,
            port_timeline,
            mem_events,
            marks,
            info,
            critical_path: graph.longest_path(),
        })
    }

    /// One simulated cycle over the window, oldest to newest. Later passes
    /// observe state already updated this cycle: an instruction entering
    /// `WriteBack` here unblocks its consumers in the same cycle's dispatch
    /// pass, and retirement is in-order because each write-back checks its
    /// predecessor's just-updated state.
    fn next_cycle(&mut self) -> CycleOutcome {
        let mut xw = self.processor.execute_width;
        let mut rw = self.processor.retire_width;
        let optimal = self.processor.sched == SchedKind::Optimal;
        let mut used_ports = vec![false; self.processor.n_ports()];
        let mut mem_event: Option<i64> = None;
        let mut queue: Vec<(usize, Vec<usize>)> = Vec::new();

        for pos in 0..self.window.len() {
            let state = self.window.at(pos).state;
            match state {
                InstrState::WriteBack => {
                    let in_order = pos == 0 || self.window.at(pos - 1).state == InstrState::Retire;
                    let inst = self.window.at_mut(pos);
                    if rw > 0 && in_order {
                        inst.state = InstrState::Retire;
                        inst.substate = InstrState::None;
                        rw -= 1;
                    } else {
                        inst.substate = InstrState::WaitRetire;
                    }
                }

                InstrState::Execute => {
                    let cycle = self.cycles as i64;
                    let inst = self.window.at_mut(pos);
                    inst.remaining = inst.remaining.saturating_sub(1);
                    if inst.remaining == 0 {
                        // A memory op completing its pipeline latency pays
                        // the cache exactly once (substate is still None);
                        // miss latency resumes the countdown.
                        let mut finished = true;
                        if inst.substate == InstrState::None
                            && inst.mem != MemKind::None
                            && let Some(cache) = self.processor.cache.as_mut()
                        {
                            let kind = match inst.mem {
                                MemKind::Store => AccessKind::Write,
                                _ => AccessKind::Read,
                            };
                            let access = cache.access(kind, inst.mem_addr.unwrap_or_default(), cycle);
                            if access.mem_event.is_some() {
                                mem_event = access.mem_event;
                            }
                            inst.remaining = access.latency;
                            inst.exec_lat += access.latency;
                            if access.latency > 0 {
                                inst.substate = match access.outcome {
                                    core_processor::AccessOutcome::Miss => {
                                        InstrState::WaitCacheMiss
                                    }
                                    _ => InstrState::WaitCacheSecond,
                                };
                                finished = false;
                            }
                        }
                        if finished {
                            inst.state = InstrState::WriteBack;
                            inst.substate = InstrState::None;
                        }
                    }
                }

                InstrState::Dispatch => {
                    let (dyn_idx, static_idx, substate) = {
                        let inst = self.window.at(pos);
                        (inst.dyn_idx, inst.static_idx, inst.substate)
                    };

                    // Re-check data readiness unless a port stall already
                    // proved the operands ready last cycle.
                    let mut waiting = false;
                    if matches!(substate, InstrState::None | InstrState::WaitData) {
                        for &offset in &self.program.dep_offsets[static_idx] {
                            let Some(producer) = dyn_idx.checked_sub(offset) else {
                                continue;
                            };
                            // Producers that already left the window count as
                            // done.
                            if let Some(dep) = self.window.get(producer)
                                && !matches!(
                                    dep.state,
                                    InstrState::WriteBack | InstrState::Retire
                                )
                            {
                                waiting = true;
                                break;
                            }
                        }
                    }

                    if waiting {
                        self.window.at_mut(pos).substate = InstrState::WaitData;
                        continue;
                    }

                    let resource = self
                        .processor
                        .get_resource(&self.program.instructions[static_idx].kind);

                    if optimal {
                        let inst = self.window.at_mut(pos);
                        inst.substate = InstrState::None;
                        inst.remaining = resource.latency;
                        queue.push((pos, resource.ports));
                        continue;
                    }

                    if xw == 0 {
                        let inst = self.window.at_mut(pos);
                        inst.substate = InstrState::WaitBandwidth;
                        inst.exec_lat += 1;
                        continue;
                    }
                    let free = resource.ports.iter().copied().find(|&p| !used_ports[p]);
                    let cycle = self.cycles;
                    let inst = self.window.at_mut(pos);
                    match free {
                        Some(port) => {
                            used_ports[port] = true;
                            inst.exec_cycle = cycle;
                            inst.remaining = resource.latency;
                            inst.exec_lat += resource.latency;
                            inst.state = InstrState::Execute;
                            inst.substate = InstrState::None;
                            inst.port = Some(port);
                            xw -= 1;
                        }
                        None => {
                            inst.substate = InstrState::WaitResource;
                            inst.exec_lat += 1;
                        }
                    }
                }

                _ => {}
            }
        }

        if optimal && !queue.is_empty() {
            let candidates: Vec<Candidate> = queue
                .iter()
                .map(|(pos, ports)| Candidate {
                    window_pos: *pos,
                    ports: ports.clone(),
                })
                .collect();
            let assigned = assign_optimal(&candidates);
            let cycle = self.cycles;
            for (pos, _) in &queue {
                let port = assigned
                    .iter()
                    .find(|(assigned_pos, _)| assigned_pos == pos)
                    .map(|&(_, port)| port);
                let inst = self.window.at_mut(*pos);
                inst.substate = InstrState::None;
                if xw == 0 {
                    inst.substate = InstrState::WaitBandwidth;
                    inst.exec_lat += 1;
                    continue;
                }
                match port {
                    Some(port) => {
                        used_ports[port] = true;
                        inst.exec_cycle = cycle;
                        inst.state = InstrState::Execute;
                        inst.substate = InstrState::None;
                        inst.port = Some(port);
                        inst.exec_lat += inst.remaining;
                        xw -= 1;
                    }
                    None => {
                        inst.substate = InstrState::WaitResource;
                        inst.exec_lat += 1;
                    }
                }
            }
        }

        CycleOutcome {
            retires: (self.processor.retire_width - rw) as usize,
            used_ports,
            mem_event,
        }
    }

    /// Admit up to `dispatch_w` new instances, then advance the cycle
    /// counter. Memory instructions capture their strided address here.
    fn dispatch_in(&mut self) -> Result<(), SchedError> {
        let n = self.program.len();
        let mut dw = self.processor.dispatch_width;
        while dw > 0 && !self.window.is_full() && n > 0 {
            let static_idx = self.pc % n;
            let instr = &self.program.instructions[static_idx];
            let mem = instr.mem_kind();
            let mem_addr = if mem != MemKind::None && self.processor.cache.is_some() {
                let cursor = &mut self.mem[static_idx];
                let addr = cursor.next_addr;
                cursor.next_addr += instr.stride;
                cursor.count += 1;
                if cursor.count >= instr.naccess.max(1) {
                    cursor.count = 0;
                    cursor.next_addr = instr.addr;
                }
                Some(addr)
            } else {
                None
            };
            self.window.push(InstrInstance::new(
                self.cycles,
                self.pc,
                static_idx,
                mem,
                mem_addr,
            ))?;
            self.pc += 1;
            dw -= 1;
        }
        self.cycles += 1;
        Ok(())
    }
}
