//! Report rendering: the dynamic JSON report carries the documented key set,
//! listings include every instruction, and the timeline has one row per
//! dynamic instruction.

use core_processor::Processor;
use core_program::Program;
use core_sched::Scheduler;

fn fixture() -> (Program, Processor) {
    let program = Program::from_json(
        r#"{
            "name": "pair",
            "n": 2,
            "instruction_list": [
                {"type": "ARITH", "text": "add x, x, y", "destin": "x",
                 "source1": "x", "source2": "y"},
                {"type": "ARITH", "text": "sub y, x, 1", "destin": "y",
                 "source1": "x", "constant": "1"}
            ]
        }"#,
    )
    .expect("valid program");
    let processor = Processor::from_json(
        r#"{
            "name": "twoport",
            "dispatch": 2,
            "retire": 2,
            "latencies": {"ARITH": 1},
            "ports": {"0": ["ARITH"], "1": ["ARITH"]}
        }"#,
    )
    .expect("valid processor");
    (program, processor)
}

#[test]
fn dynamic_json_report_carries_the_documented_keys() {
    let (program, mut processor) = fixture();
    let execution = Scheduler::load(&program, &mut processor, 5, 32)
        .expect("valid configuration")
        .run()
        .expect("run completes");

    let text = core_report::dynamic_report_json(&program, &processor, &execution);
    let value: serde_json::Value = serde_json::from_str(&text).expect("valid JSON");

    for key in [
        "total_iterations",
        "total_instructions",
        "total_cycles",
        "ipc",
        "cycles_per_iteration",
        "ports",
        "critical_path",
    ] {
        assert!(value.get(key).is_some(), "missing key {key}");
    }
    assert_eq!(value["total_iterations"], 5);
    assert_eq!(value["total_instructions"], 10);

    let cp = &value["critical_path"];
    assert_eq!(cp["instructions"].as_array().map(|a| a.len()), Some(2));
    assert!(cp.get("dispatch").is_some());
    assert!(cp.get("retire").is_some());

    // No cache configured: no memory keys.
    assert!(value.get("MM_usage").is_none());
}

#[test]
fn static_json_report_carries_the_documented_keys() {
    let (program, processor) = fixture();
    let analysis = core_analysis::analyze(&program, &processor);
    let text = core_report::static_report_json(&analysis, &processor);
    let value: serde_json::Value = serde_json::from_str(&text).expect("valid JSON");

    for key in [
        "name",
        "LatencyTime",
        "ThroughputTime",
        "performance-bound",
        "BestTime",
        "Throughput-Bottlenecks",
    ] {
        assert!(value.get(key).is_some(), "missing key {key}");
    }
    assert_eq!(value["performance-bound"], "LATENCY");
}

#[test]
fn listings_mention_every_instruction() {
    let (program, processor) = fixture();
    let code = core_report::program_listing(&program, &processor);
    let deps = core_report::dependence_listing(&program);
    for instr in &program.instructions {
        assert!(code.contains(&instr.text));
        assert!(deps.contains(&instr.text));
    }
    assert!(code.contains("LATENCY"));
    assert!(deps.contains("Loop-Carried"));
}

#[test]
fn timeline_has_one_row_per_dynamic_instruction() {
    let (program, mut processor) = fixture();
    let execution = Scheduler::load(&program, &mut processor, 3, 32)
        .expect("valid configuration")
        .run()
        .expect("run completes");

    let timeline = core_report::timeline(&program, &processor, &execution);
    for iteration in 0..3 {
        for idx in 0..2 {
            assert!(timeline.contains(&format!("[{iteration},{idx}]")));
        }
    }
    // State letters and the port rows are present.
    assert!(timeline.contains("P.0"));
    assert!(timeline.contains('D'));
    assert!(timeline.contains('R'));
}

#[test]
fn graphviz_marks_the_recurrence() {
    let (program, processor) = fixture();
    let analysis = core_analysis::analyze(&program, &processor);
    let dot = core_report::graphviz(&program, &analysis, 2, false);
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("cluster_1"));
    assert!(dot.contains("cluster_2"));
    assert!(dot.contains("color=red"));
    assert!(dot.ends_with("}\n"));
}
