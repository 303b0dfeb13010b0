//! core-analysis: the static performance model.
//!
//! Combines recurrence (cyclic-path) latencies with dispatch/retire widths
//! and a port-pressure bound over every execution-port subset, classifying a
//! loop as latency- or throughput-bound. All arithmetic stays rational so
//! ties (LATENCY+THROUGHPUT) are exact, never a float coincidence.

use core_program::Program;
use core_processor::Processor;
use std::cmp::Ordering;
use std::fmt;

/// An unevaluated non-negative fraction. Comparison cross-multiplies in
/// 128-bit, so `2/4 == 1/2` and no precision is lost.
#[derive(Debug, Clone, Copy)]
pub struct Ratio {
    num: u64,
    den: u64,
}

impl Ratio {
    pub const ZERO: Ratio = Ratio { num: 0, den: 1 };

    pub fn new(num: u64, den: u64) -> Self {
        debug_assert!(den > 0, "ratio denominators are positive");
        Ratio { num, den }
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    pub fn num(&self) -> u64 {
        self.num
    }

    pub fn den(&self) -> u64 {
        self.den
    }
}

impl PartialEq for Ratio {
    fn eq(&self, other: &Self) -> bool {
        self.num as u128 * other.den as u128 == other.num as u128 * self.den as u128
    }
}

impl Eq for Ratio {}

impl PartialOrd for Ratio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ratio {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.num as u128 * other.den as u128).cmp(&(other.num as u128 * self.den as u128))
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.as_f64())
    }
}

/// Which constraint dictates the minimum cycles per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Latency,
    Throughput,
    LatencyAndThroughput,
}

/// One cyclic dependence path with its summed latency and the number of loop
/// iterations the closed walk spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMetrics {
    pub path: Vec<usize>,
    pub latency: u64,
    pub iterations: u64,
}

impl PathMetrics {
    pub fn cycles_per_iteration(&self) -> Ratio {
        Ratio::new(self.latency, self.iterations)
    }
}

/// A stage or port subset whose pressure equals the throughput bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bottleneck {
    Dispatch { cycles: Ratio },
    Retire { cycles: Ratio },
    PortGroup {
        /// Port indices forming the subset.
        ports: Vec<usize>,
        /// Instructions that can only execute inside the subset.
        instructions: Vec<usize>,
        cycles: Ratio,
    },
}

#[derive(Debug, Clone)]
pub struct StaticAnalysis {
    pub name: String,
    pub latency_bound: Ratio,
    pub throughput_bound: Ratio,
    pub bound: BoundKind,
    /// `max(latency_bound, throughput_bound)`: the cycles-per-iteration floor.
    pub best_cycles: Ratio,
    pub bottlenecks: Vec<Bottleneck>,
    pub paths: Vec<PathMetrics>,
    /// Resolved latency per static instruction.
    pub latencies: Vec<u64>,
    /// Allowed-port bitmask per static instruction.
    pub port_masks: Vec<u32>,
}

/// Resolved latencies for the whole instruction list.
pub fn instr_latencies(program: &Program, processor: &Processor) -> Vec<u64> {
    program
        .instructions
        .iter()
        .map(|instr| processor.get_resource(&instr.kind).latency)
        .collect()
}

/// Allowed-port bitmasks for the whole instruction list.
pub fn instr_port_masks(program: &Program, processor: &Processor) -> Vec<u32> {
    program
        .instructions
        .iter()
        .map(|instr| {
            processor
                .get_resource(&instr.kind)
                .ports
                .iter()
                .fold(0u32, |mask, &port| mask | (1 << port))
        })
        .collect()
}

/// Per-path latency metrics. A descent (`a >= b`) between consecutive path
/// members crosses the loop boundary, so the closed walk spans that many
/// iterations.
pub fn path_metrics(program: &Program, latencies: &[u64]) -> Vec<PathMetrics> {
    program
        .cyclic_paths
        .iter()
        .map(|path| {
            let latency = path[..path.len() - 1].iter().map(|&i| latencies[i]).sum();
            let iterations = path
                .windows(2)
                .filter(|pair| pair[0] >= pair[1])
                .count() as u64;
            PathMetrics {
                path: path.clone(),
                latency,
                iterations,
            }
        })
        .collect()
}

pub fn analyze(program: &Program, processor: &Processor) -> StaticAnalysis {
    let n = program.len() as u64;
    let latencies = instr_latencies(program, processor);
    let port_masks = instr_port_masks(program, processor);
    let paths = path_metrics(program, &latencies);

    let latency_bound = paths
        .iter()
        .map(PathMetrics::cycles_per_iteration)
        .max()
        .unwrap_or(Ratio::ZERO);

    let dw_cycles = Ratio::new(n, processor.dispatch_width as u64);
    let rw_cycles = Ratio::new(n, processor.retire_width as u64);

    let n_ports = processor.n_ports();
    let mut port_cycles = Ratio::ZERO;
    for mask in 1u32..(1 << n_ports) {
        let uses = port_masks.iter().filter(|&&m| m & mask == m).count() as u64;
        let cycles = Ratio::new(uses, mask.count_ones() as u64);
        if cycles > port_cycles {
            port_cycles = cycles;
        }
    }

    let throughput_bound = dw_cycles.max(rw_cycles).max(port_cycles);

    let mut bottlenecks = Vec::new();
    if dw_cycles == throughput_bound {
        bottlenecks.push(Bottleneck::Dispatch { cycles: dw_cycles });
    }
    if rw_cycles == throughput_bound {
        bottlenecks.push(Bottleneck::Retire { cycles: rw_cycles });
    }
    for mask in 1u32..(1 << n_ports) {
        let instructions: Vec<usize> = port_masks
            .iter()
            .enumerate()
            .filter(|&(_, &m)| m & mask == m)
            .map(|(i, _)| i)
            .collect();
        let cycles = Ratio::new(instructions.len() as u64, mask.count_ones() as u64);
        if cycles == throughput_bound {
            let ports = (0..n_ports).filter(|&p| mask & (1 << p) != 0).collect();
            bottlenecks.push(Bottleneck::PortGroup {
                ports,
                instructions,
                cycles,
            });
        }
    }

    let (bound, best_cycles) = match latency_bound.cmp(&throughput_bound) {
        Ordering::Greater => (BoundKind::Latency, latency_bound),
        Ordering::Less => (BoundKind::Throughput, throughput_bound),
        Ordering::Equal => (BoundKind::LatencyAndThroughput, throughput_bound),
    };

    tracing::debug!(
        target: "analysis",
        latency = %latency_bound,
        throughput = %throughput_bound,
        ?bound,
        "static analysis"
    );

    StaticAnalysis {
        name: program.name.clone(),
        latency_bound,
        throughput_bound,
        bound,
        best_cycles,
        bottlenecks,
        paths,
        latencies,
        port_masks,
    }
}
