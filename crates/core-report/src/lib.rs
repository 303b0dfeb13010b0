//! core-report: rendering of static and dynamic analysis results.
//!
//! Pure functions from analysis state to `String`: instruction listings, the
//! static bottleneck report, the dynamic performance report, the cycle
//! timeline matrix with the critical path overlaid, and a Graphviz export of
//! the dependence graph. JSON variants mirror the textual reports key for
//! key. ANSI color is applied with crossterm's `Stylize` and is cosmetic
//! only.

mod timeline;

pub use timeline::timeline;

use core_analysis::{BoundKind, Bottleneck, StaticAnalysis};
use core_processor::Processor;
use core_program::{Dependence, Program};
use core_sched::{CriticalPath, Execution};
use crossterm::style::Stylize;
use std::fmt::Write as _;

/// Instruction listing with resolved latency and execution ports.
pub fn program_listing(program: &Program, processor: &Processor) -> String {
    let instr_pad = program
        .instructions
        .iter()
        .map(|i| i.text.len())
        .max()
        .unwrap_or(0)
        .max("INSTRUCTIONS".len());
    let type_pad = program
        .instructions
        .iter()
        .map(|i| i.kind.len())
        .max()
        .unwrap_or(0)
        .max("TYPE".len());
    let idx_pad = program.len().to_string().len();

    let mut out = format!(
        "{:idx_pad$}  {:instr_pad$}   {:type_pad$} LATENCY EXECUTION PORTS\n",
        "", "INSTRUCTIONS", "TYPE"
    );
    for (i, instr) in program.instructions.iter().enumerate() {
        let resource = processor.get_resource(&instr.kind);
        let ports = resource
            .ports
            .iter()
            .map(|&p| format!("P{}", processor.ports[p].id))
            .collect::<Vec<_>>()
            .join(",");
        let _ = writeln!(
            out,
            "{i:idx_pad$}: {:instr_pad$} : {:type_pad$} : {:^3} : {ports}",
            instr.text, instr.kind, resource.latency
        );
    }
    out
}

/// Per-instruction dependence listing plus the symbol tables. Constants are
/// cyan, read-only inputs blue, loop-carried producers red.
pub fn dependence_listing(program: &Program) -> String {
    let idx_pad = program.len().to_string().len();
    let mut out = String::from("............... Instruction Data-Dependences ......................\n");

    for (i, deps) in program.dependences.iter().enumerate() {
        let _ = write!(out, "{i:idx_pad$}: {:20}: ", program.instructions[i].text);
        for dep in deps {
            match *dep {
                Dependence::Constant { index } => {
                    let entry = format!(".. --> {:5};", program.constants[index]);
                    let _ = write!(out, "{} ", entry.cyan());
                }
                Dependence::ReadOnly { variable } => {
                    let entry = format!(".. --> {:5};", program.variables[variable]);
                    let _ = write!(out, "{} ", entry.blue());
                }
                Dependence::Data { producer, variable } => {
                    let entry = format!("{producer:2} --> {:5};", program.variables[variable]);
                    if producer >= i {
                        let _ = write!(out, "{} ", entry.red());
                    } else {
                        let _ = write!(out, "{entry} ");
                    }
                }
            }
        }
        out.push('\n');
    }

    let _ = writeln!(out, "\n Variables        : {}", program.variables.join(","));
    let _ = writeln!(
        out,
        " Constants        : {}",
        program.constants.join(",").cyan()
    );
    let _ = writeln!(
        out,
        " Read-Only vars   : {}",
        program.read_only.join(",").blue()
    );
    let carried = program
        .loop_carried
        .iter()
        .map(|(producer, name)| format!("{producer} --> {name}"))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, " Loop-Carried vars: {}", carried.red());
    let _ = writeln!(out, " Recurrent paths  : {:?}", program.cyclic_paths);
    out
}

fn bound_name(bound: BoundKind) -> &'static str {
    match bound {
        BoundKind::Latency => "LATENCY",
        BoundKind::Throughput => "THROUGHPUT",
        BoundKind::LatencyAndThroughput => "LATENCY+THROUGHPUT",
    }
}

fn bottleneck_line(b: &Bottleneck, n: usize, processor: &Processor) -> String {
    match b {
        Bottleneck::Dispatch { cycles } => format!(
            "Dispatch: {n} instr. per iter. / {} instr. per cycle = {cycles}",
            processor.dispatch_width
        ),
        Bottleneck::Retire { cycles } => format!(
            "Retire: {n} instr. per iter. / {} instr. per cycle = {cycles}",
            processor.retire_width
        ),
        Bottleneck::PortGroup {
            ports,
            instructions,
            cycles,
        } => {
            let port_str = ports
                .iter()
                .map(|&p| format!("P{}", processor.ports[p].id))
                .collect::<Vec<_>>()
                .join("+");
            let instr_str = instructions
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(",");
            format!(
                "Ports: {port_str}, Instr.: {instr_str} --> {} instr. per iter. / {} instr. per cycle = {cycles}",
                instructions.len(),
                ports.len()
            )
        }
    }
}

/// Static performance report: both bounds, the classification, every tied
/// bottleneck and the recurrent paths behind the latency bound.
pub fn static_report(analysis: &StaticAnalysis, processor: &Processor) -> String {
    let n = analysis.port_masks.len();
    let mut out = String::from("**** Static Performance Analysis ****\n\n");
    let _ = writeln!(
        out,
        "Latency bound   : {} cycles per iteration",
        analysis.latency_bound
    );
    let _ = writeln!(
        out,
        "Throughput bound: {} cycles per iteration",
        analysis.throughput_bound
    );
    let _ = writeln!(out, "Performance bound: {}", bound_name(analysis.bound));
    let _ = writeln!(
        out,
        "Best case       : {} cycles per iteration\n",
        analysis.best_cycles
    );

    if !analysis.paths.is_empty() {
        out.push_str("Recurrent paths:\n");
        for path in &analysis.paths {
            let _ = writeln!(
                out,
                "  {:?}: latency {} / {} iter. = {}",
                path.path,
                path.latency,
                path.iterations,
                path.cycles_per_iteration()
            );
        }
        out.push('\n');
    }

    out.push_str("Throughput bottlenecks:\n");
    for bottleneck in &analysis.bottlenecks {
        let _ = writeln!(out, "  {}", bottleneck_line(bottleneck, n, processor));
    }
    out
}

pub fn static_report_json(analysis: &StaticAnalysis, processor: &Processor) -> String {
    let n = analysis.port_masks.len();
    let bottlenecks: Vec<String> = analysis
        .bottlenecks
        .iter()
        .map(|b| bottleneck_line(b, n, processor))
        .collect();
    let value = serde_json::json!({
        "name": analysis.name,
        "LatencyTime": analysis.latency_bound.as_f64(),
        "ThroughputTime": analysis.throughput_bound.as_f64(),
        "performance-bound": bound_name(analysis.bound),
        "BestTime": analysis.best_cycles.as_f64(),
        "Throughput-Bottlenecks": bottlenecks,
    });
    serde_json::to_string_pretty(&value).expect("static report serializes")
}

fn usage_line(usage: f64, cycles_per_iter: f64, name: &str) -> String {
    let v1 = format!("{:0.2}", 100.0 * usage);
    let v2 = format!("{:0.2}", usage * cycles_per_iter);
    let line = format!("  {name:^10}:\t{v1:^10}\t{v2:^12}\n");
    if usage >= 0.98 {
        // Saturated resources stand out.
        format!("{}", line.cyan())
    } else {
        line
    }
}

/// Dynamic performance report over a finished execution.
pub fn dynamic_report(program: &Program, processor: &Processor, execution: &Execution) -> String {
    let ipc = execution.ipc();
    let cpi = execution.cycles_per_iteration();
    let cycles = execution.cycles.max(1);

    let mut out = String::from("**** Performance Results ****\n\n");
    let _ = writeln!(
        out,
        "Total Iterations= {}, Total Instructions= {}, Total cycles= {}, IPC= {ipc:0.2}\n",
        execution.iterations, execution.total_instructions, execution.cycles
    );
    out.push_str("  Resource  \t Usage(%) \t Cycles/iter.\n");
    out.push_str("  --------- \t----------\t ------------\n");
    let _ = writeln!(out, "   PROGRAM  :\t          \t{:^12}", format!("{cpi:0.2}"));

    out.push_str(&usage_line(
        ipc / processor.dispatch_width as f64,
        cpi,
        "dispatch",
    ));
    out.push_str(&usage_line(
        ipc / processor.execute_width as f64,
        cpi,
        "execute",
    ));
    out.push_str(&usage_line(
        ipc / processor.retire_width as f64,
        cpi,
        "retire",
    ));

    for (idx, port) in processor.ports.iter().enumerate() {
        let usage = execution.port_usage[idx] as f64 / cycles as f64;
        out.push_str(&usage_line(usage, cpi, &format!("Port {}", port.id)));
    }

    if let Some(cache) = processor.cache.as_ref() {
        let stats = cache.statistics(execution.cycles);
        out.push_str(&usage_line(stats.mm_usage, cpi, "MM total BW"));
        out.push_str(&usage_line(stats.mm_read_usage, cpi, "MM read BW"));
        let iters = execution.iterations.max(1) as f64;
        let _ = writeln!(
            out,
            "   Read Misses:\t          \t {:^10}",
            format!("{:0.2}", stats.read_misses as f64 / iters)
        );
        let _ = writeln!(
            out,
            "  Write Misses:\t          \t {:^10}",
            format!("{:0.2}", stats.write_misses as f64 / iters)
        );
    }

    out.push_str("\n  Critical Path\n  -------------\n");
    let cp = CriticalPath::attribute(execution.critical_path.clone(), program.len().max(1));
    for (i, &weight) in cp.per_instr.iter().enumerate() {
        let _ = writeln!(out, "    Instr. {i:2}: {:0.2}%", cp.percent(weight));
    }
    let _ = writeln!(out, "    DISPATCH : {:0.2}%", cp.percent(cp.dispatch));
    let _ = writeln!(out, "    RETIRE   : {:0.2}%", cp.percent(cp.retire));
    out
}

/// Dynamic report in JSON form (the machine-readable twin of
/// `dynamic_report`).
pub fn dynamic_report_json(
    program: &Program,
    processor: &Processor,
    execution: &Execution,
) -> String {
    let cycles = execution.cycles.max(1);
    let mut ports = serde_json::Map::new();
    for (idx, port) in processor.ports.iter().enumerate() {
        let usage = 100.0 * execution.port_usage[idx] as f64 / cycles as f64;
        ports.insert(port.id.clone(), serde_json::json!(usage));
    }

    let cp = CriticalPath::attribute(execution.critical_path.clone(), program.len().max(1));
    let instructions: Vec<serde_json::Value> = cp
        .per_instr
        .iter()
        .enumerate()
        .map(|(i, &weight)| {
            serde_json::json!({
                "id": i,
                "instruction": program.instructions[i].text,
                "percentage": cp.percent(weight),
            })
        })
        .collect();

    let mut value = serde_json::json!({
        "total_iterations": execution.iterations,
        "total_instructions": execution.total_instructions,
        "total_cycles": execution.cycles,
        "ipc": execution.ipc(),
        "cycles_per_iteration": execution.cycles_per_iteration(),
        "ports": ports,
        "critical_path": {
            "instructions": instructions,
            "dispatch": cp.percent(cp.dispatch),
            "retire": cp.percent(cp.retire),
        },
    });

    if let Some(cache) = processor.cache.as_ref() {
        let stats = cache.statistics(execution.cycles);
        let object = value.as_object_mut().expect("report is an object");
        object.insert("MM_usage".into(), serde_json::json!(stats.mm_usage));
        object.insert(
            "MM_read_usage".into(),
            serde_json::json!(stats.mm_read_usage),
        );
        object.insert("read_misses".into(), serde_json::json!(stats.read_misses));
        object.insert("write_misses".into(), serde_json::json!(stats.write_misses));
    }

    serde_json::to_string_pretty(&value).expect("dynamic report serializes")
}

/// Graphviz (dot) export of the dependence graph, one cluster per loop
/// iteration, recurrent dependences highlighted in red.
pub fn graphviz(program: &Program, analysis: &StaticAnalysis, iterations: usize, show_internal: bool) -> String {
    const FILLS: [&str; 7] = [
        "lightblue",
        "greenyellow",
        "lightyellow",
        "lightpink",
        "lightgrey",
        "lightcyan",
        "lightcoral",
    ];

    let min_iters = analysis
        .paths
        .iter()
        .map(|p| p.iterations as usize)
        .max()
        .unwrap_or(0);
    let iters = min_iters.max(iterations).max(1);

    let mut out = String::from(
        "digraph \"Data Dependence Graph\" {\n  rankdir=\"LR\"; splines=spline; newrank=true;\n  edge [fontname=\"courier\"; color=black; penwidth=1.5; fontcolor=blue];\n",
    );

    for iter in 1..=iters {
        let _ = writeln!(
            out,
            " subgraph cluster_{iter} {{\n  style=\"filled,rounded\"; color=blue; tooltip=\"Loop Iteration #{iter}\"; fillcolor={};",
            FILLS[(iter - 1) % FILLS.len()]
        );
        out.push_str("  node [style=filled, shape=rect, fillcolor=lightgrey, fontname=\"courier\"];\n");
        for (idx, instr) in program.instructions.iter().enumerate() {
            if show_internal || program.cyclic_members.contains(&idx) {
                let _ = writeln!(
                    out,
                    "  i{iter}s{idx} [label=<<B>({}) {idx}: {}</B>>];",
                    analysis.latencies[idx],
                    escape_html(&instr.text)
                );
            }
        }
        out.push_str(" }\n");
    }

    // Loop-carried values enter at the left fringe and exit at the right.
    for (id, (producer, name)) in program.loop_carried.iter().enumerate() {
        let cyclic = program.cyclic_members.contains(producer);
        if show_internal || cyclic {
            let color = if cyclic { "red" } else { "blue" };
            let _ = writeln!(
                out,
                " LoopCar{id} [shape=box, color=invis, fontcolor={color}, label=<<B>{name}</B>>];"
            );
            let _ = writeln!(
                out,
                " OutCar{id} [shape=box, color=invis, fontcolor={color}, label=<<B>{name}</B>>];"
            );
            let _ = writeln!(
                out,
                " i{iters}s{producer} -> OutCar{id} [color={color}, penwidth=2.0];"
            );
        }
    }

    for iter in 1..=iters {
        for (idx, deps) in program.dependences.iter().enumerate() {
            for dep in deps {
                let Dependence::Data { producer, variable } = *dep else {
                    continue;
                };
                let recurrent = program.cyclic_members.contains(&idx)
                    && program.cyclic_members.contains(&producer);
                if !recurrent && !show_internal {
                    continue;
                }
                let arrow = if recurrent {
                    ", color=red, penwidth=2.0"
                } else {
                    ""
                };
                let label = &program.variables[variable];
                let source = if producer < idx {
                    format!("i{iter}s{producer}")
                } else if iter == 1 {
                    let carried = program
                        .loop_carried
                        .iter()
                        .position(|(_, name)| name == label)
                        .unwrap_or(0);
                    format!("LoopCar{carried}")
                } else {
                    format!("i{}s{producer}", iter - 1)
                };
                let _ = writeln!(
                    out,
                    "  {source} -> i{iter}s{idx} [label=\"{label}\"{arrow}];"
                );
            }
        }
    }

    out.push_str("}\n");
    out
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
