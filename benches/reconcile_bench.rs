// Benchmark for status delta reconciliation and push parsing
// Run with: cargo bench

use criterion::{Criterion, criterion_group, criterion_main};
use printlink_rs::{AdapterConfig, ChannelSink, OperationKind, PrinterType, create_adapter};
use printlink_shared::{StatusReconciler, merge_json};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn full_snapshot() -> serde_json::Value {
    json!({
        "machine_status": {"status": 2, "sub_status": 1045, "progress": 10},
        "print_status": {"filename": "bench.gcode", "current_layer": 5, "total_layer": 500},
        "extruder": {"temperature": 220, "target": 220},
        "heater_bed": {"temperature": 60, "target": 60},
        "fans": {"fan": {"speed": 255}, "aux_fan": {"speed": 0}, "box_fan": {"speed": 128}},
        "gcode_move": {"x": 0, "y": 0, "z": 0, "speed_mode": 1}
    })
}

fn bench_merge(c: &mut Criterion) {
    let delta = json!({"extruder": {"temperature": 221.3}, "gcode_move": {"x": 10.5, "y": 3.25}});
    c.bench_function("merge small delta", |b| {
        let mut base = full_snapshot();
        b.iter(|| merge_json(&mut base, &delta));
    });
}

fn bench_reconciler(c: &mut Criterion) {
    c.bench_function("apply 1k sequenced deltas", |b| {
        b.iter(|| {
            let mut reconciler = StatusReconciler::default();
            reconciler.apply_full(full_snapshot(), Some(0));
            for seq in 1..=1000 {
                let delta = json!({"machine_status": {"progress": seq % 100}});
                reconciler.apply_delta(&delta, Some(seq));
            }
        });
    });
}

fn bench_push_parse(c: &mut Criterion) {
    let (sink, _rx) = ChannelSink::new();
    let adapter = create_adapter(PrinterType::Cc2, "bench", Arc::new(sink), &AdapterConfig::default());
    let wire = adapter
        .build_request(OperationKind::GetStatus, &json!({}), Duration::from_secs(5))
        .unwrap();
    let id: u64 = wire.vendor_id.parse().unwrap();
    let reply = serde_json::to_vec(&json!({"id": id, "method": 1002, "result": full_snapshot()})).unwrap();
    adapter.parse_response(&reply).unwrap();

    let mut seq = 0i64;
    c.bench_function("cc2 status push to event", |b| {
        b.iter(|| {
            seq += 1;
            let push = serde_json::to_vec(&json!({
                "id": seq, "method": 6000, "result": {"extruder": {"temperature": 200 + seq % 30}}
            }))
            .unwrap();
            let event = adapter.parse_event(&push);
            assert!(event.is_some());
        });
    });
}

criterion_group!(benches, bench_merge, bench_reconciler, bench_push_parse);
criterion_main!(benches);
