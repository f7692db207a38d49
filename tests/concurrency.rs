// Correlation under concurrent callers and out-of-order replies.

use printlink_rs::{
    AdapterConfig, ChannelSink, OperationKind, PrinterType, ProtocolAdapter, WireRequest, create_adapter,
};
use rand::seq::SliceRandom;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const THREADS: usize = 8;
const PER_THREAD: usize = 50;

fn adapter(printer_type: PrinterType) -> Arc<dyn ProtocolAdapter> {
    let (sink, _rx) = ChannelSink::new();
    create_adapter(printer_type, "p-concurrent", Arc::new(sink), &AdapterConfig::default())
}

fn build_many(adapter: &Arc<dyn ProtocolAdapter>) -> Vec<WireRequest> {
    thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    (0..PER_THREAD)
                        .map(|_| {
                            adapter
                                .build_request(OperationKind::PausePrint, &json!({}), Duration::from_secs(30))
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    })
}

#[test]
fn test_shuffled_replies_resolve_to_their_callers() {
    let adapter = adapter(PrinterType::Cc2);
    let requests = build_many(&adapter);
    assert_eq!(requests.len(), THREADS * PER_THREAD);
    assert_eq!(adapter.pending_count(), THREADS * PER_THREAD);

    let expected: HashMap<String, String> = requests
        .iter()
        .map(|r| (r.vendor_id.clone(), r.standard_id.clone()))
        .collect();
    assert_eq!(expected.len(), requests.len(), "vendor ids must be unique");

    let mut replies: Vec<(String, Vec<u8>)> = requests
        .iter()
        .map(|r| {
            let id: u64 = r.vendor_id.parse().unwrap();
            let bytes = serde_json::to_vec(&json!({"id": id, "method": 1021, "result": {"error_code": 0}})).unwrap();
            (r.vendor_id.clone(), bytes)
        })
        .collect();
    replies.shuffle(&mut rand::rng());

    let chunks: Vec<_> = replies.chunks(PER_THREAD).collect();
    let resolved: Vec<(String, String)> = thread::scope(|scope| {
        let handles: Vec<_> = chunks
            .iter()
            .map(|chunk| {
                let adapter = &adapter;
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|(vendor_id, bytes)| {
                            let response = adapter.parse_response(bytes).unwrap();
                            assert!(response.is_success());
                            (vendor_id.clone(), response.correlation_id)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(resolved.len(), requests.len());
    for (vendor_id, correlation_id) in resolved {
        assert_eq!(expected[&vendor_id], correlation_id);
    }
    assert_eq!(adapter.pending_count(), 0);
}

const MIXED_KINDS: [OperationKind; 6] = [
    OperationKind::GetStatus,
    OperationKind::GetAttributes,
    OperationKind::GetCanvasInfo,
    OperationKind::PausePrint,
    OperationKind::ResumePrint,
    OperationKind::StopPrint,
];

fn cc2_result(kind: OperationKind) -> Value {
    match kind {
        OperationKind::GetAttributes => json!({"error_code": 0, "hostname": "mixed", "software_version": {"ota_version": "1.2.0"}}),
        OperationKind::GetCanvasInfo => json!({"error_code": 0, "canvas_info": {"active_canvas_id": 0, "canvas_list": []}}),
        _ => json!({"error_code": 0}),
    }
}

/// Id-correlated replies arrive shuffled on several threads while status
/// queries are answered by sequenced pushes on another. Every caller is
/// resolved exactly once.
#[test]
fn test_mixed_kinds_resolve_exactly_once() {
    let adapter = adapter(PrinterType::Cc2);
    let seed = adapter
        .build_request(OperationKind::GetStatus, &json!({}), Duration::from_secs(30))
        .unwrap();
    let id: u64 = seed.vendor_id.parse().unwrap();
    let full = json!({"id": id, "method": 1002, "result": {"error_code": 0, "machine_status": {"status": 1}}});
    adapter.parse_response(&serde_json::to_vec(&full).unwrap()).unwrap();

    let requests: Vec<WireRequest> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let adapter = &adapter;
                scope.spawn(move || {
                    (0..PER_THREAD)
                        .map(|i| {
                            let kind = MIXED_KINDS[(t + i) % MIXED_KINDS.len()];
                            adapter.build_request(kind, &json!({}), Duration::from_secs(30)).unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(adapter.pending_count(), requests.len());

    let status_queries = requests.iter().filter(|r| r.kind == OperationKind::GetStatus).count();
    let mut replies: Vec<Vec<u8>> = requests
        .iter()
        .filter(|r| r.kind != OperationKind::GetStatus)
        .map(|r| {
            let msg: Value = serde_json::from_slice(&r.bytes).unwrap();
            serde_json::to_vec(&json!({"id": msg["id"], "method": msg["method"], "result": cc2_result(r.kind)}))
                .unwrap()
        })
        .collect();
    replies.shuffle(&mut rand::rng());

    let resolved: Vec<String> = thread::scope(|scope| {
        let mut handles: Vec<_> = replies
            .chunks(PER_THREAD)
            .map(|chunk| {
                let adapter = &adapter;
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|bytes| adapter.parse_response(bytes).unwrap().correlation_id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let adapter = &adapter;
        handles.push(scope.spawn(move || {
            (1..=status_queries as i64)
                .map(|seq| {
                    let push = serde_json::to_vec(&json!({
                        "id": seq, "method": 6000, "result": {"extruder": {"temperature": seq}}
                    }))
                    .unwrap();
                    let response = adapter.parse_response(&push).unwrap();
                    assert_eq!(response.kind, OperationKind::GetStatus);
                    assert!(adapter.parse_event(&push).is_some());
                    response.correlation_id
                })
                .collect::<Vec<_>>()
        }));
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    });

    let expected: HashSet<&str> = requests.iter().map(|r| r.standard_id.as_str()).collect();
    let unique: HashSet<&str> = resolved.iter().map(String::as_str).collect();
    assert_eq!(resolved.len(), requests.len(), "no caller resolved twice");
    assert_eq!(unique, expected);
    assert_eq!(adapter.pending_count(), 0);
}

#[test]
fn test_cancel_races_with_replies() {
    let adapter = adapter(PrinterType::Moonraker);
    let requests = build_many(&adapter);
    let (cancelled, answered) = requests.split_at(requests.len() / 2);

    thread::scope(|scope| {
        scope.spawn(|| {
            for r in cancelled {
                assert!(adapter.cancel(&r.standard_id).is_some());
            }
        });
        scope.spawn(|| {
            for r in answered {
                let id: u64 = r.vendor_id.parse().unwrap();
                let bytes = serde_json::to_vec(&json!({"jsonrpc": "2.0", "result": "ok", "id": id})).unwrap();
                assert_eq!(adapter.parse_response(&bytes).unwrap().correlation_id, r.standard_id);
            }
        });
    });
    assert_eq!(adapter.pending_count(), 0);

    // Replies for cancelled requests find nothing.
    let id: u64 = cancelled[0].vendor_id.parse().unwrap();
    let late = serde_json::to_vec(&json!({"jsonrpc": "2.0", "result": "ok", "id": id})).unwrap();
    assert!(adapter.parse_response(&late).is_err());
}

/// Pushes carry no request id, so overlapping status queries are answered
/// strictly oldest first. If the printer actually answered the newer query,
/// the reply is attributed to the older one. Known limitation of the protocol.
#[test]
fn test_overlapping_status_queries_resolve_oldest_first() {
    let adapter = adapter(PrinterType::Cc);
    let first = adapter
        .build_request(OperationKind::GetStatus, &json!({}), Duration::from_secs(30))
        .unwrap();
    let second = adapter
        .build_request(OperationKind::GetStatus, &json!({}), Duration::from_secs(30))
        .unwrap();

    let push = serde_json::to_vec(&json!({
        "Status": {"CurrentStatus": [0]},
        "Topic": "sdcp/status/p-concurrent",
    }))
    .unwrap();

    let response = adapter.parse_response(&push).unwrap();
    assert_eq!(response.correlation_id, first.standard_id);
    adapter.parse_event(&push).unwrap();
    assert_eq!(adapter.pending_count(), 1);

    let response = adapter.parse_response(&push).unwrap();
    assert_eq!(response.correlation_id, second.standard_id);
    adapter.parse_event(&push).unwrap();
    assert_eq!(adapter.pending_count(), 0);
}

#[test]
fn test_concurrent_pushes_keep_snapshot_consistent() {
    let adapter = adapter(PrinterType::Moonraker);
    let wire = adapter
        .build_request(OperationKind::GetStatus, &json!({}), Duration::from_secs(30))
        .unwrap();
    let id: u64 = wire.vendor_id.parse().unwrap();
    let reply = json!({"jsonrpc": "2.0", "id": id, "result": {"status": {"print_stats": {"state": "printing"}}}});
    adapter.parse_response(&serde_json::to_vec(&reply).unwrap()).unwrap();

    thread::scope(|scope| {
        for t in 0..THREADS {
            let adapter = &adapter;
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    let key = format!("temperature_sensor t{}", t);
                    let bytes = serde_json::to_vec(&json!({
                        "jsonrpc": "2.0",
                        "method": "notify_status_update",
                        "params": [{ key: {"temperature": i} }, 0.0]
                    }))
                    .unwrap();
                    let event = adapter.parse_event(&bytes).unwrap();
                    assert_eq!(event.data["state"], "printing");
                }
            });
        }
    });
}
